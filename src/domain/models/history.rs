//! Append-only workflow history.
//!
//! Every accepted transition writes one entry in the same transaction as the
//! state change it records. Entries are never updated or deleted; replaying
//! them reconstructs an instance's status and current step, which is the
//! audit-trail guarantee the engine makes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instance::InstanceStatus;

/// Action recorded by a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Started,
    StepActivated,
    TaskAssigned,
    Claimed,
    Approved,
    Rejected,
    Delegated,
    Escalated,
    InfoRequested,
    InfoProvided,
    StepApproved,
    StepRejected,
    Completed,
    InstanceRejected,
    Cancelled,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::StepActivated => "step_activated",
            Self::TaskAssigned => "task_assigned",
            Self::Claimed => "claimed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Delegated => "delegated",
            Self::Escalated => "escalated",
            Self::InfoRequested => "info_requested",
            Self::InfoProvided => "info_provided",
            Self::StepApproved => "step_approved",
            Self::StepRejected => "step_rejected",
            Self::Completed => "completed",
            Self::InstanceRejected => "instance_rejected",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "started" => Some(Self::Started),
            "step_activated" => Some(Self::StepActivated),
            "task_assigned" => Some(Self::TaskAssigned),
            "claimed" => Some(Self::Claimed),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "delegated" => Some(Self::Delegated),
            "escalated" => Some(Self::Escalated),
            "info_requested" => Some(Self::InfoRequested),
            "info_provided" => Some(Self::InfoProvided),
            "step_approved" => Some(Self::StepApproved),
            "step_rejected" => Some(Self::StepRejected),
            "completed" => Some(Self::Completed),
            "instance_rejected" => Some(Self::InstanceRejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this action is an approver's own decision.
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub step_sequence: Option<u32>,
    pub task_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: HistoryAction,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(instance_id: Uuid, action: HistoryAction, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id,
            step_sequence: None,
            task_id: None,
            actor_id: None,
            action,
            detail: None,
            recorded_at,
        }
    }

    pub fn with_step(mut self, sequence: u32) -> Self {
        self.step_sequence = Some(sequence);
        self
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Instance state reconstructed from history alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayedState {
    pub status: InstanceStatus,
    pub current_sequence: u32,
    pub on_hold: bool,
}

/// Replay an instance's history into its current state.
///
/// Entries must be in commit order. The result must always agree with the
/// stored instance row; any divergence means a transition bypassed the
/// transactional write path.
pub fn replay_instance_state(entries: &[HistoryEntry]) -> ReplayedState {
    let mut state = ReplayedState {
        status: InstanceStatus::InProgress,
        current_sequence: 0,
        on_hold: false,
    };
    for entry in entries {
        match entry.action {
            HistoryAction::StepActivated => {
                if let Some(seq) = entry.step_sequence {
                    state.current_sequence = seq;
                    state.on_hold = false;
                }
            }
            HistoryAction::Started => {
                state.status = InstanceStatus::InProgress;
            }
            HistoryAction::InfoRequested => state.on_hold = true,
            HistoryAction::InfoProvided => state.on_hold = false,
            HistoryAction::Completed => {
                state.status = InstanceStatus::Approved;
                state.on_hold = false;
            }
            HistoryAction::InstanceRejected => {
                state.status = InstanceStatus::Rejected;
                state.on_hold = false;
            }
            HistoryAction::Cancelled => {
                state.status = InstanceStatus::Cancelled;
                state.on_hold = false;
            }
            _ => {}
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(instance: Uuid, action: HistoryAction, seq: Option<u32>) -> HistoryEntry {
        let mut e = HistoryEntry::new(instance, action, Utc::now());
        e.step_sequence = seq;
        e
    }

    #[test]
    fn test_replay_happy_path() {
        let id = Uuid::new_v4();
        let entries = vec![
            entry(id, HistoryAction::Started, None),
            entry(id, HistoryAction::StepActivated, Some(1)),
            entry(id, HistoryAction::Approved, Some(1)),
            entry(id, HistoryAction::StepApproved, Some(1)),
            entry(id, HistoryAction::StepActivated, Some(2)),
            entry(id, HistoryAction::Approved, Some(2)),
            entry(id, HistoryAction::StepApproved, Some(2)),
            entry(id, HistoryAction::Completed, None),
        ];
        let state = replay_instance_state(&entries);
        assert_eq!(state.status, InstanceStatus::Approved);
        assert_eq!(state.current_sequence, 2);
        assert!(!state.on_hold);
    }

    #[test]
    fn test_replay_hold_cycle() {
        let id = Uuid::new_v4();
        let entries = vec![
            entry(id, HistoryAction::Started, None),
            entry(id, HistoryAction::StepActivated, Some(1)),
            entry(id, HistoryAction::InfoRequested, Some(1)),
        ];
        assert!(replay_instance_state(&entries).on_hold);

        let mut resumed = entries;
        resumed.push(entry(id, HistoryAction::InfoProvided, Some(1)));
        let state = replay_instance_state(&resumed);
        assert!(!state.on_hold);
        assert_eq!(state.status, InstanceStatus::InProgress);
        assert_eq!(state.current_sequence, 1);
    }

    #[test]
    fn test_replay_rejection_and_cancel() {
        let id = Uuid::new_v4();
        let rejected = vec![
            entry(id, HistoryAction::Started, None),
            entry(id, HistoryAction::StepActivated, Some(1)),
            entry(id, HistoryAction::Rejected, Some(1)),
            entry(id, HistoryAction::StepRejected, Some(1)),
            entry(id, HistoryAction::InstanceRejected, None),
        ];
        assert_eq!(replay_instance_state(&rejected).status, InstanceStatus::Rejected);

        let cancelled = vec![
            entry(id, HistoryAction::Started, None),
            entry(id, HistoryAction::StepActivated, Some(1)),
            entry(id, HistoryAction::Cancelled, None),
        ];
        assert_eq!(replay_instance_state(&cancelled).status, InstanceStatus::Cancelled);
    }
}
