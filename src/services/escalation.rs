//! Escalation sweeper.
//!
//! Stateless, idempotent pass over overdue tasks, invoked by an external
//! scheduler (the `sweep` CLI command is the cron target). Escalations go
//! through the same guarded transition write as manual actions, so a
//! concurrent decision or a second sweep simply loses the version guard and
//! the row is skipped. Per-row failures are isolated and counted, never
//! aborting the sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalTask, ApproverSpec};
use crate::domain::ports::{InstanceRepository, Notifier, TaskRepository};
use crate::services::approver_resolver::{ApproverResolver, ResolutionContext};
use crate::services::orchestrator::WorkflowOrchestrator;

/// Summary of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: u64,
    pub escalated: u64,
    pub reminded: u64,
    pub skipped: u64,
    pub failed: u64,
}

enum SweepAction {
    Escalated,
    Reminded,
    Skipped,
}

/// Processes overdue tasks in batches.
pub struct EscalationService {
    tasks: Arc<dyn TaskRepository>,
    instances: Arc<dyn InstanceRepository>,
    resolver: ApproverResolver,
    notifier: Arc<dyn Notifier>,
    orchestrator: Arc<WorkflowOrchestrator>,
    batch_size: u32,
}

impl EscalationService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        instances: Arc<dyn InstanceRepository>,
        resolver: ApproverResolver,
        notifier: Arc<dyn Notifier>,
        orchestrator: Arc<WorkflowOrchestrator>,
        batch_size: u32,
    ) -> Self {
        Self { tasks, instances, resolver, notifier, orchestrator, batch_size }
    }

    /// One sweep over currently overdue tasks.
    #[instrument(skip(self), err)]
    pub async fn process_overdue_steps(&self) -> DomainResult<SweepReport> {
        let now = Utc::now();
        let overdue = self.tasks.list_overdue(now, self.batch_size).await?;

        let mut report = SweepReport { scanned: overdue.len() as u64, ..SweepReport::default() };
        for task in overdue {
            match self.process_one(&task, now).await {
                Ok(SweepAction::Escalated) => report.escalated += 1,
                Ok(SweepAction::Reminded) => report.reminded += 1,
                Ok(SweepAction::Skipped) => report.skipped += 1,
                Err(error) => {
                    warn!(task_id = %task.id, %error, "Overdue task processing failed");
                    report.failed += 1;
                }
            }
        }
        info!(
            scanned = report.scanned,
            escalated = report.escalated,
            reminded = report.reminded,
            skipped = report.skipped,
            failed = report.failed,
            "Escalation sweep finished"
        );
        Ok(report)
    }

    async fn process_one(&self, task: &ApprovalTask, now: DateTime<Utc>) -> DomainResult<SweepAction> {
        let Some(instance) = self.instances.get(task.instance_id).await? else {
            return Err(DomainError::InstanceNotFound(task.instance_id));
        };
        if instance.is_terminal() {
            return Ok(SweepAction::Skipped);
        }
        let Some(step) = instance.step(task.step_sequence) else {
            return Ok(SweepAction::Skipped);
        };

        let Some(role_id) = step.escalation_role else {
            // No escalation target configured: remind and leave pending.
            self.notifier.overdue_reminder(task.assignee_id, task).await;
            return Ok(SweepAction::Reminded);
        };

        // Resolve the role like any other approver spec so a member's
        // standing delegation substitutes here too.
        let context = ResolutionContext {
            workflow_code: instance.definition_code.clone(),
            initiator_id: instance.initiator_id,
        };
        let candidates = self.resolver.resolve(&ApproverSpec::Role(role_id), &context, now).await?;
        let target = candidates
            .iter()
            .find(|c| c.employee_id != task.assignee_id)
            .or_else(|| candidates.first())
            .ok_or_else(|| DomainError::UnresolvedApprover(format!("escalation role {role_id} has no members")))?;

        match self.orchestrator.escalate_task(task.id, target.employee_id).await {
            Ok(_) => Ok(SweepAction::Escalated),
            // A concurrent actor won the guard; the row is no longer ours.
            Err(
                DomainError::StaleTask(_)
                | DomainError::ConcurrencyConflict { .. }
                | DomainError::InstanceNotActive(_)
                | DomainError::TaskNotFound(_),
            ) => Ok(SweepAction::Skipped),
            Err(error) => Err(error),
        }
    }
}
