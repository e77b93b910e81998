use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ApprovalTask, HistoryEntry, InstanceStatus, WorkflowInstance};

/// A version-guarded task write inside a transition.
#[derive(Debug, Clone)]
pub struct GuardedTask {
    /// The task in its post-transition state (version already bumped).
    pub task: ApprovalTask,
    /// Version the row must still have for the write to apply.
    pub expected_version: u64,
}

impl GuardedTask {
    /// Guard on the version the task had before its latest mutation.
    pub fn from_mutated(task: ApprovalTask) -> Self {
        let expected_version = task.version - 1;
        Self { task, expected_version }
    }
}

/// A version-guarded instance write inside a transition.
#[derive(Debug, Clone)]
pub struct GuardedInstance {
    pub instance: WorkflowInstance,
    pub expected_version: u64,
}

impl GuardedInstance {
    pub fn from_mutated(instance: WorkflowInstance) -> Self {
        let expected_version = instance.version - 1;
        Self { instance, expected_version }
    }
}

/// Everything one accepted transition writes, committed atomically.
///
/// The acted-on task carries the optimistic-concurrency guard that closes the
/// race between concurrent approvers: if its version check fails the whole
/// write rolls back and the caller gets `StaleTask`. History entries ride in
/// the same transaction so a crash can never split a state change from its
/// audit record.
#[derive(Debug, Clone, Default)]
pub struct TransitionWrite {
    /// The task the actor acted on; its guard failing means `StaleTask`.
    pub acted_task: Option<GuardedTask>,
    /// Sibling rows superseded or cancelled alongside the action.
    pub sibling_tasks: Vec<GuardedTask>,
    /// Replacement and next-step task rows spawned by the transition.
    pub new_tasks: Vec<ApprovalTask>,
    /// Instance update (status, current step cache, hold flag).
    pub instance: Option<GuardedInstance>,
    /// Audit entries, appended in commit order.
    pub history: Vec<HistoryEntry>,
}

/// Repository port for workflow instance persistence and transactional
/// transition commits.
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Create a new instance together with its first tasks and history,
    /// in one transaction.
    async fn create(
        &self,
        instance: &WorkflowInstance,
        tasks: &[ApprovalTask],
        history: &[HistoryEntry],
    ) -> DomainResult<()>;

    /// Get an instance by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowInstance>>;

    /// Find the active (in-progress) instance for an entity, if any.
    async fn find_active_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> DomainResult<Option<WorkflowInstance>>;

    /// Commit one transition atomically. Fails with `StaleTask` when the
    /// acted task's version guard misses, `ConcurrencyConflict` when a
    /// sibling or instance guard misses.
    async fn commit_transition(&self, write: TransitionWrite) -> DomainResult<()>;

    /// All in-progress instances.
    async fn list_in_progress(&self) -> DomainResult<Vec<WorkflowInstance>>;

    /// Instances started inside a date range.
    async fn list_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<WorkflowInstance>>;

    /// Instance counts per status.
    async fn count_by_status(&self) -> DomainResult<HashMap<InstanceStatus, u64>>;
}
