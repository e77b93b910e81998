//! Domain errors for the ratify workflow engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the workflow engine.
///
/// Configuration errors (`UnknownWorkflowCode`, `UnresolvedApprover`) are
/// fatal and surfaced to whoever configured or started the workflow.
/// Concurrency conflicts (`StaleTask`, `AlreadyClaimed`) are recoverable:
/// the caller re-fetches current state and retries if still applicable.
/// Authorization errors are rejected outright and never retried.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown or inactive workflow code: {0}")]
    UnknownWorkflowCode(String),

    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(Uuid),

    #[error("Could not resolve an approver: {0}")]
    UnresolvedApprover(String),

    #[error("An active workflow already exists for {entity_type} {entity_id}")]
    DuplicateWorkflow { entity_type: String, entity_id: String },

    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(Uuid),

    #[error("Workflow instance {0} is no longer in progress")]
    InstanceNotActive(Uuid),

    #[error("Approval task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task {0} was already resolved by a concurrent action")]
    StaleTask(Uuid),

    #[error("Task {0} was already claimed")]
    AlreadyClaimed(Uuid),

    #[error("Actor {actor_id} is not the assignee of task {task_id}")]
    NotAssigned { task_id: Uuid, actor_id: Uuid },

    #[error("Step does not allow delegation for task {0}")]
    DelegationNotAllowed(Uuid),

    #[error("Step does not allow rejection for task {0}")]
    RejectionNotAllowed(Uuid),

    #[error("Invalid delegation: {0}")]
    InvalidDelegation(String),

    #[error("Delegation not found: {0}")]
    DelegationNotFound(Uuid),

    #[error("Employee not found: {0}")]
    EmployeeNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
