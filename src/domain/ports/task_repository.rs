use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApprovalTask, HistoryEntry, InboxEntry};

/// Filters for inbox queries.
#[derive(Default, Debug, Clone)]
pub struct InboxFilter {
    /// Only tasks of instances with this workflow code.
    pub definition_code: Option<String>,
    /// Only tasks whose due time has passed.
    pub overdue_only: bool,
    /// Only department-owned tasks that can still be claimed.
    pub claimable_only: bool,
}

/// Repository port for approval task reads and the atomic claim.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Get a task by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalTask>>;

    /// All tasks of an instance, in assignment order.
    async fn list_for_instance(&self, instance_id: Uuid) -> DomainResult<Vec<ApprovalTask>>;

    /// Live (assigned / info-requested) tasks of one step.
    async fn list_live_for_step(&self, instance_id: Uuid, sequence: u32) -> DomainResult<Vec<ApprovalTask>>;

    /// Live tasks assigned to a user, joined with instance context.
    async fn assigned_to(&self, user_id: Uuid, filter: &InboxFilter, now: DateTime<Utc>) -> DomainResult<Vec<InboxEntry>>;

    /// Live tasks routed to a department, joined with instance context.
    async fn for_department(
        &self,
        department_id: Uuid,
        filter: &InboxFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InboxEntry>>;

    /// Atomically claim a department-owned task for one user.
    ///
    /// First claim wins; the guarded update fails with `AlreadyClaimed` for
    /// everyone else. The history entry commits in the same transaction.
    async fn claim(&self, task_id: Uuid, claimant_id: Uuid, entry: HistoryEntry) -> DomainResult<ApprovalTask>;

    /// Assigned tasks whose due time has passed, oldest due first.
    async fn list_overdue(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ApprovalTask>>;

    /// Count of live tasks.
    async fn count_live(&self) -> DomainResult<u64>;

    /// Count of live tasks past their due time.
    async fn count_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64>;
}
