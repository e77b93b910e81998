//! Delegation administration: create, cancel, and list delegations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ApprovalDelegation;
use crate::domain::ports::{DelegationRepository, Directory};

pub struct DelegationService {
    delegations: Arc<dyn DelegationRepository>,
    directory: Arc<dyn Directory>,
}

impl DelegationService {
    pub fn new(delegations: Arc<dyn DelegationRepository>, directory: Arc<dyn Directory>) -> Self {
        Self { delegations, directory }
    }

    /// Register a delegation window. Both parties must be active employees.
    #[instrument(skip(self), fields(delegator_id = %delegator_id, delegate_id = %delegate_id), err)]
    pub async fn create_delegation(
        &self,
        delegator_id: Uuid,
        delegate_id: Uuid,
        workflow_code: Option<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> DomainResult<ApprovalDelegation> {
        let mut delegation = ApprovalDelegation::new(delegator_id, delegate_id, starts_at, ends_at);
        if let Some(code) = workflow_code {
            delegation = delegation.with_workflow_code(code);
        }
        delegation.validate().map_err(DomainError::InvalidDelegation)?;

        for employee_id in [delegator_id, delegate_id] {
            let employee = self
                .directory
                .employee(employee_id)
                .await?
                .ok_or(DomainError::EmployeeNotFound(employee_id))?;
            if !employee.active {
                return Err(DomainError::InvalidDelegation(format!("{} is inactive", employee.name)));
            }
        }

        self.delegations.create(&delegation).await?;
        info!(delegation_id = %delegation.id, "Delegation created");
        Ok(delegation)
    }

    /// Cancel a delegation. Only its delegator may cancel it.
    #[instrument(skip(self), fields(delegation_id = %delegation_id, actor_id = %actor_id), err)]
    pub async fn cancel_delegation(&self, delegation_id: Uuid, actor_id: Uuid) -> DomainResult<()> {
        let delegation = self
            .delegations
            .get(delegation_id)
            .await?
            .ok_or(DomainError::DelegationNotFound(delegation_id))?;
        if delegation.delegator_id != actor_id {
            return Err(DomainError::InvalidDelegation(
                "only the delegator can cancel a delegation".to_string(),
            ));
        }
        self.delegations.cancel(delegation_id).await
    }

    /// Active delegations an employee is party to, as delegator or delegate.
    #[instrument(skip(self), fields(employee_id = %employee_id), err)]
    pub async fn active_delegations(&self, employee_id: Uuid) -> DomainResult<Vec<ApprovalDelegation>> {
        self.delegations.active_involving(employee_id, Utc::now()).await
    }
}
