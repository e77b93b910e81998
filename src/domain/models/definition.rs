//! Workflow definition model.
//!
//! A definition is the declarative configuration of one approval workflow:
//! an ordered list of steps, each naming who approves it and how escalation
//! behaves. Definitions are created by configuration, mutated only via
//! explicit update/activate/deactivate, and never deleted while instances
//! reference them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who approves a step, as declared in configuration.
///
/// Resolution to concrete employees happens at step activation time, so the
/// same definition keeps working as people move between roles and departments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ApproverSpec {
    /// All active members of a role.
    Role(Uuid),
    /// One specific employee.
    Employee(Uuid),
    /// The head of a department; tasks stay department-claimable.
    Department(Uuid),
    /// A rule expression evaluated against the instance context.
    ///
    /// Supported forms: `initiator.manager`, `department.head`,
    /// `role:<CODE>`, `employee:<UUID>`.
    Expression(String),
}

impl ApproverSpec {
    /// Storage encoding as a (kind, value) pair.
    pub fn encode(&self) -> (&'static str, String) {
        match self {
            Self::Role(id) => ("role", id.to_string()),
            Self::Employee(id) => ("employee", id.to_string()),
            Self::Department(id) => ("department", id.to_string()),
            Self::Expression(expr) => ("expression", expr.clone()),
        }
    }

    /// Decode from the (kind, value) storage pair.
    pub fn decode(kind: &str, value: &str) -> Result<Self, String> {
        let parse = |v: &str| Uuid::parse_str(v).map_err(|e| e.to_string());
        match kind {
            "role" => Ok(Self::Role(parse(value)?)),
            "employee" => Ok(Self::Employee(parse(value)?)),
            "department" => Ok(Self::Department(parse(value)?)),
            "expression" => Ok(Self::Expression(value.to_string())),
            other => Err(format!("Unknown approver kind: {}", other)),
        }
    }
}

/// Type of a workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Requires a decision from the resolved approvers.
    Approval,
    /// Notifies the resolved approvers and auto-advances.
    Notification,
    /// Approval step whose outcome gates further progress.
    Conditional,
}

impl Default for StepType {
    fn default() -> Self {
        Self::Approval
    }
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Notification => "notification",
            Self::Conditional => "conditional",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approval" => Some(Self::Approval),
            "notification" => Some(Self::Notification),
            "conditional" => Some(Self::Conditional),
            _ => None,
        }
    }

    /// Whether this step waits for an approver decision.
    pub fn requires_decision(&self) -> bool {
        matches!(self, Self::Approval | Self::Conditional)
    }
}

/// One configured stage of approval within a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Filled in when the step is attached to a definition.
    #[serde(default = "Uuid::nil")]
    pub definition_id: Uuid,
    /// Order within the definition; unique per definition.
    pub sequence: u32,
    pub name: String,
    #[serde(default)]
    pub step_type: StepType,
    pub approver: ApproverSpec,
    /// Whether the assignee may delegate this step.
    #[serde(default = "default_true")]
    pub allow_delegation: bool,
    /// Whether the assignee may reject this step.
    #[serde(default = "default_true")]
    pub allow_rejection: bool,
    /// Hours before an unresolved task becomes overdue.
    #[serde(default)]
    pub escalation_hours: Option<u32>,
    /// Role that receives escalated tasks. None means remind only.
    #[serde(default)]
    pub escalation_role: Option<Uuid>,
}

const fn default_true() -> bool {
    true
}

impl WorkflowStep {
    pub fn new(definition_id: Uuid, sequence: u32, name: impl Into<String>, approver: ApproverSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition_id,
            sequence,
            name: name.into(),
            step_type: StepType::Approval,
            approver,
            allow_delegation: true,
            allow_rejection: true,
            escalation_hours: None,
            escalation_role: None,
        }
    }

    /// Set the step type.
    pub fn with_type(mut self, step_type: StepType) -> Self {
        self.step_type = step_type;
        self
    }

    /// Set escalation: hours until overdue and the role that takes over.
    pub fn with_escalation(mut self, hours: u32, role: Option<Uuid>) -> Self {
        self.escalation_hours = Some(hours);
        self.escalation_role = role;
        self
    }

    /// Disallow delegation on this step.
    pub fn without_delegation(mut self) -> Self {
        self.allow_delegation = false;
        self
    }

    /// Disallow rejection on this step.
    pub fn without_rejection(mut self) -> Self {
        self.allow_rejection = false;
        self
    }
}

/// A configured approval workflow: identity, behavior flags, ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Unique short code used by callers to start instances.
    pub code: String,
    pub name: String,
    /// The business entity type this workflow governs (e.g. "LeaveRequest").
    pub entity_type: String,
    /// Overall SLA budget for the whole workflow.
    #[serde(default)]
    pub sla_hours: Option<u32>,
    /// Fan tasks out to every resolved approver at once.
    #[serde(default)]
    pub allow_parallel_approval: bool,
    /// A step resolves only when every fanned-out task reaches a decision.
    #[serde(default)]
    pub require_all_approvers: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    pub fn new(code: impl Into<String>, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            entity_type: entity_type.into(),
            sla_hours: None,
            allow_parallel_approval: false,
            require_all_approvers: false,
            active: true,
            created_at: now,
            updated_at: now,
            steps: Vec::new(),
        }
    }

    /// Append a step. Sequences must stay unique; `validate` enforces it.
    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Enable parallel fan-out, optionally requiring all approvers.
    pub fn with_parallel_approval(mut self, require_all: bool) -> Self {
        self.allow_parallel_approval = true;
        self.require_all_approvers = require_all;
        self
    }

    /// Set the overall SLA.
    pub fn with_sla_hours(mut self, hours: u32) -> Self {
        self.sla_hours = Some(hours);
        self
    }

    /// Steps ordered by sequence.
    pub fn ordered_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.sequence);
        steps
    }

    /// Validate the definition before it is persisted.
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("Workflow code cannot be empty".to_string());
        }
        if self.entity_type.trim().is_empty() {
            return Err("Entity type cannot be empty".to_string());
        }
        if self.steps.is_empty() {
            return Err("Workflow must have at least one step".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.sequence) {
                return Err(format!("Duplicate step sequence: {}", step.sequence));
            }
            if step.name.trim().is_empty() {
                return Err(format!("Step {} name cannot be empty", step.sequence));
            }
            if let ApproverSpec::Expression(expr) = &step.approver {
                if expr.trim().is_empty() {
                    return Err(format!("Step {} has an empty approver expression", step.sequence));
                }
            }
        }
        if self.require_all_approvers && !self.allow_parallel_approval {
            return Err("require_all_approvers needs allow_parallel_approval".to_string());
        }
        Ok(())
    }
}
