//! Workflow instance model.
//!
//! One instance per (definition, target entity). The step list is frozen into
//! the instance at start so definition edits never change in-flight behavior.
//! `current_sequence` is a cache of the active step recomputed at every
//! commit; the history trail is the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::definition::{ApproverSpec, StepType, WorkflowDefinition, WorkflowStep};

/// Overall status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    InProgress,
    Approved,
    Rejected,
    Cancelled,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen copy of one step, taken at instance start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub sequence: u32,
    pub name: String,
    pub step_type: StepType,
    pub approver: ApproverSpec,
    pub allow_delegation: bool,
    pub allow_rejection: bool,
    pub escalation_hours: Option<u32>,
    pub escalation_role: Option<Uuid>,
    /// When this step was last activated. Tasks assigned before this moment
    /// belong to an earlier pass over the step.
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowStep> for StepSnapshot {
    fn from(step: &WorkflowStep) -> Self {
        Self {
            sequence: step.sequence,
            name: step.name.clone(),
            step_type: step.step_type,
            approver: step.approver.clone(),
            allow_delegation: step.allow_delegation,
            allow_rejection: step.allow_rejection,
            escalation_hours: step.escalation_hours,
            escalation_role: step.escalation_role,
            activated_at: None,
        }
    }
}

/// One run of a workflow over one business entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub definition_id: Uuid,
    pub definition_code: String,
    pub entity_type: String,
    pub entity_id: String,
    /// Free-text reference for display ("Leave request #42, 3 days").
    pub entity_reference: String,
    pub initiator_id: Uuid,
    pub initiator_comments: Option<String>,
    pub status: InstanceStatus,
    /// Cache of the active step; derived from live tasks, History is truth.
    pub current_sequence: u32,
    /// Set while a task of the current step awaits initiator input.
    pub on_hold: bool,
    /// Behavior flags frozen from the definition.
    pub allow_parallel: bool,
    pub require_all: bool,
    /// Step configuration frozen at start.
    pub steps: Vec<StepSnapshot>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Version for optimistic locking.
    pub version: u64,
}

impl WorkflowInstance {
    /// Snapshot a definition into a fresh in-progress instance.
    pub fn start(
        definition: &WorkflowDefinition,
        entity_id: impl Into<String>,
        entity_reference: impl Into<String>,
        initiator_id: Uuid,
        initiator_comments: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let mut steps: Vec<StepSnapshot> = definition.steps.iter().map(StepSnapshot::from).collect();
        steps.sort_by_key(|s| s.sequence);
        let first_sequence = steps.first().map_or(0, |s| s.sequence);
        Self {
            id: Uuid::new_v4(),
            definition_id: definition.id,
            definition_code: definition.code.clone(),
            entity_type: definition.entity_type.clone(),
            entity_id: entity_id.into(),
            entity_reference: entity_reference.into(),
            initiator_id,
            initiator_comments,
            status: InstanceStatus::InProgress,
            current_sequence: first_sequence,
            on_hold: false,
            allow_parallel: definition.allow_parallel_approval,
            require_all: definition.require_all_approvers,
            steps,
            started_at,
            completed_at: None,
            version: 1,
        }
    }

    /// The snapshot for a given sequence.
    pub fn step(&self, sequence: u32) -> Option<&StepSnapshot> {
        self.steps.iter().find(|s| s.sequence == sequence)
    }

    /// The next step after `sequence`, in order.
    pub fn next_step_after(&self, sequence: u32) -> Option<&StepSnapshot> {
        self.steps.iter().filter(|s| s.sequence > sequence).min_by_key(|s| s.sequence)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Finish the instance with a terminal status.
    pub fn complete(&mut self, status: InstanceStatus, completed_at: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(completed_at);
        self.on_hold = false;
        self.version += 1;
    }

    /// Move the active-step cache to `sequence` and stamp the activation
    /// time on its snapshot.
    pub fn advance_to(&mut self, sequence: u32, now: DateTime<Utc>) {
        self.current_sequence = sequence;
        self.on_hold = false;
        if let Some(step) = self.steps.iter_mut().find(|s| s.sequence == sequence) {
            step.activated_at = Some(now);
        }
        self.version += 1;
    }

    /// Set or clear the initiator-input hold.
    pub fn set_hold(&mut self, on_hold: bool) {
        self.on_hold = on_hold;
        self.version += 1;
    }
}
