use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ApprovalDelegation;

/// Repository port for approval delegations.
///
/// Read-only to the resolver; writable only through create and cancel.
#[async_trait]
pub trait DelegationRepository: Send + Sync {
    /// Insert a new delegation.
    async fn create(&self, delegation: &ApprovalDelegation) -> DomainResult<()>;

    /// Get a delegation by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalDelegation>>;

    /// Mark a delegation inactive. Fails with `DelegationNotFound` when the
    /// id is unknown or the delegation was already cancelled.
    async fn cancel(&self, id: Uuid) -> DomainResult<()>;

    /// Delegations by a delegator that are in force at `now`.
    ///
    /// Scope and tie-break selection happen in the resolver; this returns
    /// every candidate.
    async fn active_for_delegator(&self, delegator_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<ApprovalDelegation>>;

    /// Active delegations an employee is party to, as delegator or delegate.
    async fn active_involving(&self, employee_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<ApprovalDelegation>>;
}
