//! Log-backed notifier.
//!
//! The standalone deployment has no mail or chat integration, so
//! notifications surface as structured log events. Hosts with a real channel
//! implement `Notifier` themselves.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{ApprovalTask, WorkflowInstance};
use crate::domain::ports::Notifier;

#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn task_assigned(&self, assignee_id: Uuid, instance: &WorkflowInstance, task: &ApprovalTask) {
        info!(
            assignee_id = %assignee_id,
            instance_id = %instance.id,
            task_id = %task.id,
            step_sequence = task.step_sequence,
            entity_reference = %instance.entity_reference,
            "Approval task assigned"
        );
    }

    async fn overdue_reminder(&self, assignee_id: Uuid, task: &ApprovalTask) {
        info!(
            assignee_id = %assignee_id,
            task_id = %task.id,
            due_at = ?task.due_at,
            "Approval task overdue"
        );
    }

    async fn instance_finished(&self, instance: &WorkflowInstance) {
        info!(
            instance_id = %instance.id,
            initiator_id = %instance.initiator_id,
            status = instance.status.as_str(),
            entity_reference = %instance.entity_reference,
            "Workflow finished"
        );
    }
}
