//! Approval delegation model.
//!
//! A delegation substitutes one approver identity for another inside a
//! validity window, optionally scoped to a single workflow code. Delegations
//! are never followed transitively: a delegate's own delegations are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-bounded substitution of one approver for another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDelegation {
    pub id: Uuid,
    pub delegator_id: Uuid,
    pub delegate_id: Uuid,
    /// None means the delegation covers every workflow.
    pub workflow_code: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApprovalDelegation {
    pub fn new(
        delegator_id: Uuid,
        delegate_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            delegator_id,
            delegate_id,
            workflow_code: None,
            starts_at,
            ends_at,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Scope to one workflow code.
    pub fn with_workflow_code(mut self, code: impl Into<String>) -> Self {
        self.workflow_code = Some(code.into());
        self
    }

    /// Whether the delegation is in force at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.starts_at <= now && now < self.ends_at
    }

    /// Whether the delegation covers the given workflow code.
    pub fn covers(&self, workflow_code: &str) -> bool {
        self.workflow_code.as_deref().is_none_or(|scope| scope == workflow_code)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.delegator_id == self.delegate_id {
            return Err("Cannot delegate to oneself".to_string());
        }
        if self.ends_at <= self.starts_at {
            return Err("Delegation window must end after it starts".to_string());
        }
        Ok(())
    }
}

/// Pick the delegation that applies for a delegator, if any.
///
/// Workflow-scoped delegations win over global ones; remaining ties resolve
/// to the most recently created. Single hop only — callers must not feed the
/// winner's own delegations back in.
pub fn applicable_delegation<'a>(
    delegations: &'a [ApprovalDelegation],
    workflow_code: &str,
    now: DateTime<Utc>,
) -> Option<&'a ApprovalDelegation> {
    delegations
        .iter()
        .filter(|d| d.is_active_at(now) && d.covers(workflow_code))
        .max_by_key(|d| (d.workflow_code.is_some(), d.created_at))
}
