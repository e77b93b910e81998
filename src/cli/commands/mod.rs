//! CLI command implementations.

pub mod definition;
pub mod delegation;
pub mod directory;
pub mod init;
pub mod report;
pub mod sweep;
pub mod tasks;
pub mod workflow;
