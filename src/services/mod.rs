//! Service layer: the engine's public operations over the domain ports.

pub mod approver_resolver;
pub mod delegation_service;
pub mod escalation;
pub mod orchestrator;
pub mod reporting;
pub mod task_queue;

pub use approver_resolver::{ApproverResolver, Candidate, ResolutionContext};
pub use delegation_service::DelegationService;
pub use escalation::{EscalationService, SweepReport};
pub use orchestrator::{RejectionOutcome, RejectionPolicy, TerminateOnRejection, WorkflowOrchestrator};
pub use reporting::{AuditReport, Dashboard, ReportingService, Statistics, StepTimeline};
pub use task_queue::TaskQueueService;
