//! Per-user and per-department inbox views, plus the atomic claim.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalTask, HistoryAction, HistoryEntry, InboxEntry, TaskStatus};
use crate::domain::ports::{Directory, InboxFilter, TaskRepository};

/// Read projection over live tasks and the claim operation.
pub struct TaskQueueService {
    tasks: Arc<dyn TaskRepository>,
    directory: Arc<dyn Directory>,
}

impl TaskQueueService {
    pub fn new(tasks: Arc<dyn TaskRepository>, directory: Arc<dyn Directory>) -> Self {
        Self { tasks, directory }
    }

    /// Live tasks assigned to a user, with instance context for display.
    #[instrument(skip(self, filter), fields(user_id = %user_id), err)]
    pub async fn my_tasks(&self, user_id: Uuid, filter: &InboxFilter) -> DomainResult<Vec<InboxEntry>> {
        self.tasks.assigned_to(user_id, filter, Utc::now()).await
    }

    /// Live tasks routed to a department inbox.
    #[instrument(skip(self, filter), fields(department_id = %department_id), err)]
    pub async fn department_tasks(
        &self,
        department_id: Uuid,
        filter: &InboxFilter,
    ) -> DomainResult<Vec<InboxEntry>> {
        self.tasks.for_department(department_id, filter, Utc::now()).await
    }

    /// Claim a department-owned task. First claim wins; losers of the race
    /// get `AlreadyClaimed`.
    #[instrument(skip(self), fields(task_id = %task_id, claimant_id = %claimant_id), err)]
    pub async fn claim_task(&self, task_id: Uuid, claimant_id: Uuid) -> DomainResult<ApprovalTask> {
        let task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        if !task.claimable || task.status.is_terminal() {
            return Err(DomainError::AlreadyClaimed(task_id));
        }
        // An info-hold is not a lost race; the task becomes claimable again
        // once the initiator answers.
        if task.status != TaskStatus::Assigned {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::Assigned.as_str().to_string(),
                reason: "only an assigned task can be claimed".to_string(),
            });
        }

        let claimant = self
            .directory
            .employee(claimant_id)
            .await?
            .filter(|e| e.active)
            .ok_or(DomainError::EmployeeNotFound(claimant_id))?;
        if task.department_id.is_some() && claimant.department_id != task.department_id {
            return Err(DomainError::NotAssigned { task_id, actor_id: claimant_id });
        }

        let entry = HistoryEntry::new(task.instance_id, HistoryAction::Claimed, Utc::now())
            .with_step(task.step_sequence)
            .with_task(task.id)
            .with_actor(claimant_id);
        let claimed = self.tasks.claim(task_id, claimant_id, entry).await?;
        info!(task_id = %task_id, claimant_id = %claimant_id, "Task claimed");
        Ok(claimed)
    }
}
