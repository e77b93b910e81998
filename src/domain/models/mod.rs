//! Domain models for the ratify workflow engine.

pub mod config;
pub mod definition;
pub mod delegation;
pub mod directory;
pub mod history;
pub mod instance;
pub mod task;

pub use config::{Config, DatabaseConfig, EngineConfig, LoggingConfig};
pub use definition::{ApproverSpec, StepType, WorkflowDefinition, WorkflowStep};
pub use delegation::{applicable_delegation, ApprovalDelegation};
pub use directory::{Department, Employee, Role};
pub use history::{replay_instance_state, HistoryAction, HistoryEntry, ReplayedState};
pub use instance::{InstanceStatus, StepSnapshot, WorkflowInstance};
pub use task::{ApprovalTask, InboxEntry, TaskStatus};
