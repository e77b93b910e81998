use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Department, Employee, Role};

/// Identity and org-structure lookups the approver resolver consumes.
///
/// Hosts may substitute their own identity source; the bundled SQLite
/// implementation is enough for standalone use. All lookups are read-only.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Get an employee by id.
    async fn employee(&self, id: Uuid) -> DomainResult<Option<Employee>>;

    /// Get a department by id.
    async fn department(&self, id: Uuid) -> DomainResult<Option<Department>>;

    /// Get a role by id.
    async fn role(&self, id: Uuid) -> DomainResult<Option<Role>>;

    /// Get a role by its code.
    async fn role_by_code(&self, code: &str) -> DomainResult<Option<Role>>;

    /// Active members of a role, ordered by employee id for deterministic
    /// resolution.
    async fn role_members(&self, role_id: Uuid) -> DomainResult<Vec<Employee>>;
}
