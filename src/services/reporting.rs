//! Reporting over the audit trail.
//!
//! Everything here is read-only: raw history, the per-step audit timeline,
//! live dashboard counts, and period statistics. The replay helper is exposed
//! so callers (and tests) can check the stored instance row against what the
//! history alone reconstructs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    replay_instance_state, HistoryAction, HistoryEntry, InstanceStatus, ReplayedState,
};
use crate::domain::ports::{HistoryRepository, InstanceRepository, TaskRepository};

/// One actor-level line within a step timeline.
#[derive(Debug, Clone, Serialize)]
pub struct StepAction {
    pub action: HistoryAction,
    pub actor_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Replayed timeline of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepTimeline {
    pub sequence: u32,
    pub name: String,
    pub activated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    /// "approved" / "rejected", None while unresolved.
    pub outcome: Option<&'static str>,
    pub actions: Vec<StepAction>,
}

/// Full audit view of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub instance_id: Uuid,
    pub definition_code: String,
    pub entity_type: String,
    pub entity_reference: String,
    pub initiator_id: Uuid,
    pub status: InstanceStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepTimeline>,
}

/// Live operational counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub in_progress_instances: u64,
    pub on_hold_instances: u64,
    pub open_tasks: u64,
    pub overdue_tasks: u64,
    pub per_definition: BTreeMap<String, u64>,
}

/// Outcome statistics over instances started in a period.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub started: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub in_progress: u64,
    /// approved / (approved + rejected); 0.0 when no decisions yet.
    pub approval_rate: f64,
    pub avg_completion_hours: Option<f64>,
}

pub struct ReportingService {
    instances: Arc<dyn InstanceRepository>,
    tasks: Arc<dyn TaskRepository>,
    history: Arc<dyn HistoryRepository>,
}

impl ReportingService {
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        tasks: Arc<dyn TaskRepository>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        Self { instances, tasks, history }
    }

    /// Raw ordered history of one instance.
    #[instrument(skip(self), fields(instance_id = %instance_id), err)]
    pub async fn workflow_history(&self, instance_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        self.require_instance(instance_id).await?;
        self.history.for_instance(instance_id).await
    }

    /// Replay one instance's history into a per-step timeline with durations.
    #[instrument(skip(self), fields(instance_id = %instance_id), err)]
    pub async fn audit_report(&self, instance_id: Uuid) -> DomainResult<AuditReport> {
        let instance = self.require_instance(instance_id).await?;
        let entries = self.history.for_instance(instance_id).await?;

        let steps = instance
            .steps
            .iter()
            .map(|snapshot| {
                let of_step: Vec<&HistoryEntry> =
                    entries.iter().filter(|e| e.step_sequence == Some(snapshot.sequence)).collect();
                let activated_at = of_step
                    .iter()
                    .filter(|e| e.action == HistoryAction::StepActivated)
                    .map(|e| e.recorded_at)
                    .last();
                let resolution = of_step
                    .iter()
                    .filter(|e| matches!(e.action, HistoryAction::StepApproved | HistoryAction::StepRejected))
                    .last();
                let resolved_at = resolution.map(|e| e.recorded_at);
                let outcome = resolution.map(|e| {
                    if e.action == HistoryAction::StepApproved { "approved" } else { "rejected" }
                });
                let duration_hours = match (activated_at, resolved_at) {
                    (Some(start), Some(end)) => Some((end - start).num_seconds() as f64 / 3600.0),
                    _ => None,
                };
                StepTimeline {
                    sequence: snapshot.sequence,
                    name: snapshot.name.clone(),
                    activated_at,
                    resolved_at,
                    duration_hours,
                    outcome,
                    actions: of_step
                        .iter()
                        .map(|e| StepAction {
                            action: e.action,
                            actor_id: e.actor_id,
                            task_id: e.task_id,
                            detail: e.detail.clone(),
                            recorded_at: e.recorded_at,
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(AuditReport {
            instance_id: instance.id,
            definition_code: instance.definition_code,
            entity_type: instance.entity_type,
            entity_reference: instance.entity_reference,
            initiator_id: instance.initiator_id,
            status: instance.status,
            started_at: instance.started_at,
            completed_at: instance.completed_at,
            steps,
        })
    }

    /// Current live counts across the engine.
    #[instrument(skip(self), err)]
    pub async fn dashboard(&self) -> DomainResult<Dashboard> {
        let now = Utc::now();
        let in_progress = self.instances.list_in_progress().await?;

        let mut dashboard = Dashboard {
            in_progress_instances: in_progress.len() as u64,
            on_hold_instances: in_progress.iter().filter(|i| i.on_hold).count() as u64,
            open_tasks: self.tasks.count_live().await?,
            overdue_tasks: self.tasks.count_overdue(now).await?,
            per_definition: BTreeMap::new(),
        };
        for instance in &in_progress {
            *dashboard.per_definition.entry(instance.definition_code.clone()).or_insert(0) += 1;
        }
        Ok(dashboard)
    }

    /// Outcome statistics for instances started inside `[from, to)`.
    #[instrument(skip(self), err)]
    pub async fn statistics(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DomainResult<Statistics> {
        let started = self.instances.list_started_between(from, to).await?;

        let mut stats = Statistics { started: started.len() as u64, ..Statistics::default() };
        let mut completion_hours = Vec::new();
        for instance in &started {
            match instance.status {
                InstanceStatus::Approved => stats.approved += 1,
                InstanceStatus::Rejected => stats.rejected += 1,
                InstanceStatus::Cancelled => stats.cancelled += 1,
                InstanceStatus::InProgress => stats.in_progress += 1,
            }
            if let Some(completed_at) = instance.completed_at {
                completion_hours.push((completed_at - instance.started_at).num_seconds() as f64 / 3600.0);
            }
        }
        let decided = stats.approved + stats.rejected;
        if decided > 0 {
            stats.approval_rate = stats.approved as f64 / decided as f64;
        }
        if !completion_hours.is_empty() {
            stats.avg_completion_hours =
                Some(completion_hours.iter().sum::<f64>() / completion_hours.len() as f64);
        }
        Ok(stats)
    }

    /// Reconstruct an instance's state from history alone.
    ///
    /// Must always agree with the stored row; divergence means a transition
    /// bypassed the transactional write path.
    #[instrument(skip(self), fields(instance_id = %instance_id), err)]
    pub async fn replayed_state(&self, instance_id: Uuid) -> DomainResult<ReplayedState> {
        self.require_instance(instance_id).await?;
        let entries = self.history.for_instance(instance_id).await?;
        Ok(replay_instance_state(&entries))
    }

    async fn require_instance(&self, instance_id: Uuid) -> DomainResult<crate::domain::models::WorkflowInstance> {
        self.instances.get(instance_id).await?.ok_or(DomainError::InstanceNotFound(instance_id))
    }
}
