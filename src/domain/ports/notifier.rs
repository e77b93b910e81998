use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::{ApprovalTask, WorkflowInstance};

/// Fire-and-forget notification sender.
///
/// Implementations must swallow their own failures: a broken notification
/// channel never blocks workflow progression. Methods return nothing for
/// that reason.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A task was assigned to an approver.
    async fn task_assigned(&self, assignee_id: Uuid, instance: &WorkflowInstance, task: &ApprovalTask);

    /// An overdue task has no escalation target; remind the assignee.
    async fn overdue_reminder(&self, assignee_id: Uuid, task: &ApprovalTask);

    /// An instance reached a terminal status; tell the initiator.
    async fn instance_finished(&self, instance: &WorkflowInstance);
}
