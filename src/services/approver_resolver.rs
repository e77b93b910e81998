//! Approver resolution.
//!
//! Turns a step's declarative approver specification plus the instance
//! context into a concrete, ordered list of candidate approvers. Resolution
//! happens at step activation time, so definitions keep working as people
//! move between roles and departments. Delegation substitution is a single
//! hop: the delegate's own delegations are never consulted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{applicable_delegation, ApproverSpec, Employee};
use crate::domain::ports::{DelegationRepository, Directory};

/// One resolved approver candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub employee_id: Uuid,
    /// Department inbox the task is routed to, when department-owned.
    pub department_id: Option<Uuid>,
    /// Whether the task stays claimable by other department members.
    pub claimable: bool,
}

impl Candidate {
    fn direct(employee_id: Uuid) -> Self {
        Self { employee_id, department_id: None, claimable: false }
    }

    fn department_owned(employee_id: Uuid, department_id: Uuid) -> Self {
        Self { employee_id, department_id: Some(department_id), claimable: true }
    }
}

/// Instance context resolution evaluates against.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub workflow_code: String,
    pub initiator_id: Uuid,
}

/// Resolves approver specifications to candidate employees.
pub struct ApproverResolver {
    directory: Arc<dyn Directory>,
    delegations: Arc<dyn DelegationRepository>,
}

impl ApproverResolver {
    pub fn new(directory: Arc<dyn Directory>, delegations: Arc<dyn DelegationRepository>) -> Self {
        Self { directory, delegations }
    }

    /// Resolve a spec to a non-empty, deduplicated candidate list.
    ///
    /// Fails with `UnresolvedApprover` when the spec yields nobody; the
    /// caller surfaces that instead of guessing a fallback.
    #[instrument(skip(self, context), fields(workflow_code = %context.workflow_code), err)]
    pub async fn resolve(
        &self,
        spec: &ApproverSpec,
        context: &ResolutionContext,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Candidate>> {
        let base = self.base_candidates(spec, context).await?;

        let mut resolved = Vec::with_capacity(base.len());
        for candidate in base {
            resolved.push(self.substitute_delegation(candidate, &context.workflow_code, now).await?);
        }

        // Dedupe keeping first occurrence; delegation can collapse distinct
        // base identities onto one delegate.
        let mut seen = std::collections::HashSet::new();
        resolved.retain(|c| seen.insert(c.employee_id));

        if resolved.is_empty() {
            return Err(DomainError::UnresolvedApprover(format!(
                "spec {:?} resolved to no active approver",
                spec.encode().0
            )));
        }
        debug!(candidates = resolved.len(), "Resolved approvers");
        Ok(resolved)
    }

    async fn base_candidates(&self, spec: &ApproverSpec, context: &ResolutionContext) -> DomainResult<Vec<Candidate>> {
        match spec {
            ApproverSpec::Role(role_id) => self.role_candidates(*role_id).await,
            ApproverSpec::Employee(employee_id) => {
                Ok(self.active_employee(*employee_id).await?.map(|e| vec![Candidate::direct(e.id)]).unwrap_or_default())
            }
            ApproverSpec::Department(department_id) => self.department_head_candidates(*department_id).await,
            ApproverSpec::Expression(expression) => self.evaluate_expression(expression, context).await,
        }
    }

    async fn role_candidates(&self, role_id: Uuid) -> DomainResult<Vec<Candidate>> {
        // role_members returns active members ordered by id.
        let members = self.directory.role_members(role_id).await?;
        Ok(members.into_iter().map(|m| Candidate::direct(m.id)).collect())
    }

    async fn department_head_candidates(&self, department_id: Uuid) -> DomainResult<Vec<Candidate>> {
        let Some(department) = self.directory.department(department_id).await? else {
            return Err(DomainError::UnresolvedApprover(format!("unknown department {department_id}")));
        };
        let Some(head_id) = department.head_id else {
            return Err(DomainError::UnresolvedApprover(format!("department {} has no head", department.name)));
        };
        match self.active_employee(head_id).await? {
            Some(head) => Ok(vec![Candidate::department_owned(head.id, department_id)]),
            None => Ok(Vec::new()),
        }
    }

    /// Evaluate the fixed expression grammar: `initiator.manager`,
    /// `department.head`, `role:<CODE>`, `employee:<UUID>`.
    async fn evaluate_expression(&self, expression: &str, context: &ResolutionContext) -> DomainResult<Vec<Candidate>> {
        match expression.trim() {
            "initiator.manager" => {
                let initiator = self.require_employee(context.initiator_id).await?;
                let Some(manager_id) = initiator.manager_id else {
                    return Err(DomainError::UnresolvedApprover(format!(
                        "initiator {} has no manager",
                        initiator.name
                    )));
                };
                Ok(self.active_employee(manager_id).await?.map(|m| vec![Candidate::direct(m.id)]).unwrap_or_default())
            }
            "department.head" => {
                let initiator = self.require_employee(context.initiator_id).await?;
                let Some(department_id) = initiator.department_id else {
                    return Err(DomainError::UnresolvedApprover(format!(
                        "initiator {} has no department",
                        initiator.name
                    )));
                };
                self.department_head_candidates(department_id).await
            }
            expr if expr.starts_with("role:") => {
                let code = &expr["role:".len()..];
                let Some(role) = self.directory.role_by_code(code).await? else {
                    return Err(DomainError::UnresolvedApprover(format!("unknown role code {code}")));
                };
                self.role_candidates(role.id).await
            }
            expr if expr.starts_with("employee:") => {
                let raw = &expr["employee:".len()..];
                let employee_id = Uuid::parse_str(raw)
                    .map_err(|_| DomainError::UnresolvedApprover(format!("malformed employee id {raw}")))?;
                Ok(self.active_employee(employee_id).await?.map(|e| vec![Candidate::direct(e.id)]).unwrap_or_default())
            }
            other => Err(DomainError::UnresolvedApprover(format!("unknown expression {other}"))),
        }
    }

    /// Substitute an active, in-scope delegation. Single hop only.
    async fn substitute_delegation(
        &self,
        candidate: Candidate,
        workflow_code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Candidate> {
        let delegations = self.delegations.active_for_delegator(candidate.employee_id, now).await?;
        match applicable_delegation(&delegations, workflow_code, now) {
            Some(delegation) => {
                debug!(
                    delegator = %candidate.employee_id,
                    delegate = %delegation.delegate_id,
                    "Substituting delegated approver"
                );
                Ok(Candidate { employee_id: delegation.delegate_id, ..candidate })
            }
            None => Ok(candidate),
        }
    }

    async fn active_employee(&self, id: Uuid) -> DomainResult<Option<Employee>> {
        Ok(self.directory.employee(id).await?.filter(|e| e.active))
    }

    async fn require_employee(&self, id: Uuid) -> DomainResult<Employee> {
        self.directory.employee(id).await?.ok_or(DomainError::EmployeeNotFound(id))
    }
}
