//! Ratify - Approval Workflow Engine
//!
//! A generic, entity-agnostic approval-workflow engine: configurable
//! sequences of approval steps with role/employee/department-resolved
//! approvers, delegation, escalation, and an append-only audit history.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain Layer** (`domain`): models, errors, and the repository /
//!   collaborator ports
//! - **Adapters** (`adapters`): SQLite implementations of every port and the
//!   log-backed notifier
//! - **Service Layer** (`services`): approver resolution, orchestration,
//!   inboxes, escalation, reporting
//! - **Infrastructure** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): the `ratify` binary surface
//!
//! Hosts embed the engine by wiring the services against their own `Directory`
//! and `Notifier` implementations; the bundled SQLite adapters make the CLI
//! self-contained.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    ApprovalDelegation, ApprovalTask, ApproverSpec, Config, DatabaseConfig, HistoryAction,
    HistoryEntry, InboxEntry, InstanceStatus, LoggingConfig, StepType, TaskStatus,
    WorkflowDefinition, WorkflowInstance, WorkflowStep,
};
pub use domain::ports::{
    DefinitionRepository, DelegationRepository, Directory, HistoryRepository, InboxFilter,
    InstanceRepository, Notifier, TaskRepository, TransitionWrite,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ApproverResolver, DelegationService, EscalationService, ReportingService, SweepReport,
    TaskQueueService, WorkflowOrchestrator,
};
