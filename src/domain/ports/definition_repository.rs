use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::WorkflowDefinition;

/// Repository port for workflow definition persistence.
///
/// Definitions are configuration: created and updated explicitly, never
/// deleted. Steps are loaded and saved with their definition.
#[async_trait]
pub trait DefinitionRepository: Send + Sync {
    /// Insert a new definition with its steps.
    async fn create(&self, definition: &WorkflowDefinition) -> DomainResult<()>;

    /// Get a definition (with steps) by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowDefinition>>;

    /// Get a definition (with steps) by its unique code.
    async fn get_by_code(&self, code: &str) -> DomainResult<Option<WorkflowDefinition>>;

    /// List definitions, optionally only active ones.
    async fn list(&self, active_only: bool) -> DomainResult<Vec<WorkflowDefinition>>;

    /// Replace a definition's fields and steps.
    ///
    /// Only affects future instances; in-flight instances run on their
    /// frozen snapshot.
    async fn update(&self, definition: &WorkflowDefinition) -> DomainResult<()>;

    /// Activate or deactivate a definition.
    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()>;
}
