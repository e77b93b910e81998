//! Approval task model.
//!
//! A task is one concrete, assignable unit of work derived from a workflow
//! step for a specific approver. A parallel step fans out into several task
//! rows at once; decisions, delegation, and escalation all act on single rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an approval task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Live, awaiting the assignee's action.
    Assigned,
    /// Live, paused while the initiator supplies more information.
    InfoRequested,
    /// Terminal decision: approved.
    Approved,
    /// Terminal decision: rejected.
    Rejected,
    /// Terminal for this row; a replacement row was spawned for the delegate.
    Delegated,
    /// Terminal for this row; a replacement row was spawned for the escalation target.
    Escalated,
    /// Terminal; a sibling resolved the step first.
    Superseded,
    /// Terminal; the instance was cancelled or the step aborted.
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Assigned
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::InfoRequested => "info_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Delegated => "delegated",
            Self::Escalated => "escalated",
            Self::Superseded => "superseded",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assigned" => Some(Self::Assigned),
            "info_requested" => Some(Self::InfoRequested),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "delegated" => Some(Self::Delegated),
            "escalated" => Some(Self::Escalated),
            "superseded" => Some(Self::Superseded),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the task still awaits action.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Assigned | Self::InfoRequested)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    /// Whether this is an approve/reject decision. Delegation, escalation,
    /// supersession, and cancellation are terminal but not decisions.
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Assigned => vec![
                Self::Approved,
                Self::Rejected,
                Self::Delegated,
                Self::Escalated,
                Self::InfoRequested,
                Self::Superseded,
                Self::Cancelled,
            ],
            Self::InfoRequested => vec![Self::Assigned, Self::Superseded, Self::Cancelled],
            _ => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// One concrete approval task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTask {
    pub id: Uuid,
    pub instance_id: Uuid,
    /// Step this task was derived from.
    pub step_sequence: u32,
    pub assignee_id: Uuid,
    /// Department the task is routed to for inbox views.
    pub department_id: Option<Uuid>,
    /// Department-owned until a member claims it.
    pub claimable: bool,
    pub status: TaskStatus,
    pub assigned_at: DateTime<Utc>,
    /// When the task becomes overdue (assignment + escalation hours).
    pub due_at: Option<DateTime<Utc>>,
    pub acted_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    /// Version for optimistic locking.
    pub version: u64,
}

impl ApprovalTask {
    pub fn new(instance_id: Uuid, step_sequence: u32, assignee_id: Uuid, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id,
            step_sequence,
            assignee_id,
            department_id: None,
            claimable: false,
            status: TaskStatus::Assigned,
            assigned_at,
            due_at: None,
            acted_at: None,
            comments: None,
            version: 1,
        }
    }

    /// Route to a department inbox.
    pub fn with_department(mut self, department_id: Uuid, claimable: bool) -> Self {
        self.department_id = Some(department_id);
        self.claimable = claimable;
        self
    }

    /// Set the due time from the step's escalation hours.
    pub fn with_due_in_hours(mut self, hours: u32) -> Self {
        self.due_at = Some(self.assigned_at + chrono::Duration::hours(i64::from(hours)));
        self
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Whether the task is overdue at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_live() && self.due_at.is_some_and(|due| due < now)
    }

    /// Transition to a new status, recording when and why.
    ///
    /// Bumps the version; the persistence layer uses the previous version as
    /// the optimistic-concurrency guard.
    pub fn transition_to(
        &mut self,
        new_status: TaskStatus,
        acted_at: DateTime<Utc>,
        comments: Option<String>,
    ) -> Result<(), String> {
        if !self.status.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }
        self.status = new_status;
        self.acted_at = Some(acted_at);
        if comments.is_some() {
            self.comments = comments;
        }
        self.version += 1;
        Ok(())
    }

    /// Spawn the replacement row created by delegation or escalation.
    ///
    /// The replacement keeps the step open under the new assignee with a
    /// fresh due budget from the step configuration; the original row stays
    /// behind as terminal history.
    pub fn replacement_for(&self, new_assignee: Uuid, assigned_at: DateTime<Utc>, due_hours: Option<u32>) -> Self {
        let mut replacement = Self::new(self.instance_id, self.step_sequence, new_assignee, assigned_at);
        replacement.department_id = self.department_id;
        if let Some(hours) = due_hours {
            replacement = replacement.with_due_in_hours(hours);
        }
        replacement
    }
}

/// A live task joined with its instance context, for inbox display.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub task: ApprovalTask,
    pub definition_code: String,
    pub entity_type: String,
    pub entity_reference: String,
}
