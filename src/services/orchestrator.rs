//! Workflow instance orchestration.
//!
//! Owns an instance's progression across its ordered steps: starting,
//! decision verbs, delegation, the info-request hold cycle, and cancellation.
//! Every accepted action commits its task updates, spawned rows, instance
//! update, and history entries in one transaction; concurrent actors are
//! arbitrated by the version guards inside that write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ApprovalTask, HistoryAction, HistoryEntry, InstanceStatus, StepSnapshot, TaskStatus,
    WorkflowInstance,
};
use crate::domain::ports::{
    DefinitionRepository, Directory, GuardedInstance, GuardedTask, InstanceRepository, Notifier,
    TaskRepository, TransitionWrite,
};
use crate::services::approver_resolver::{ApproverResolver, ResolutionContext};

/// What happens to an instance when a step is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOutcome {
    /// The whole instance becomes `Rejected`.
    TerminateInstance,
    /// The instance returns to an earlier sequence for rework.
    ReturnToStep(u32),
}

/// Pluggable policy applied when a step resolves rejected.
pub trait RejectionPolicy: Send + Sync {
    fn on_step_rejected(&self, instance: &WorkflowInstance, sequence: u32) -> RejectionOutcome;
}

/// Default policy: any step rejection terminates the instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminateOnRejection;

impl RejectionPolicy for TerminateOnRejection {
    fn on_step_rejected(&self, _instance: &WorkflowInstance, _sequence: u32) -> RejectionOutcome {
        RejectionOutcome::TerminateInstance
    }
}

/// How a decision resolved (or did not resolve) its step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    /// All-mode step still has live rows; nothing advances yet.
    Pending,
    Approved,
    Rejected,
}

/// Rows produced by activating steps from a given sequence.
#[derive(Default)]
struct Activation {
    tasks: Vec<ApprovalTask>,
    history: Vec<HistoryEntry>,
}

/// Orchestrates workflow instances over the repository and collaborator ports.
pub struct WorkflowOrchestrator {
    definitions: Arc<dyn DefinitionRepository>,
    instances: Arc<dyn InstanceRepository>,
    tasks: Arc<dyn TaskRepository>,
    directory: Arc<dyn Directory>,
    resolver: ApproverResolver,
    notifier: Arc<dyn Notifier>,
    rejection_policy: Arc<dyn RejectionPolicy>,
    /// Fallback due budget for steps without `escalation_hours`; 0 disables.
    default_escalation_hours: u32,
}

impl WorkflowOrchestrator {
    pub fn new(
        definitions: Arc<dyn DefinitionRepository>,
        instances: Arc<dyn InstanceRepository>,
        tasks: Arc<dyn TaskRepository>,
        directory: Arc<dyn Directory>,
        resolver: ApproverResolver,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            definitions,
            instances,
            tasks,
            directory,
            resolver,
            notifier,
            rejection_policy: Arc::new(TerminateOnRejection),
            default_escalation_hours: 0,
        }
    }

    /// Replace the default rejection policy.
    pub fn with_rejection_policy(mut self, policy: Arc<dyn RejectionPolicy>) -> Self {
        self.rejection_policy = policy;
        self
    }

    /// Apply a due budget to steps that configure none. 0 disables the
    /// fallback.
    pub fn with_default_escalation_hours(mut self, hours: u32) -> Self {
        self.default_escalation_hours = hours;
        self
    }

    /// Start a workflow over a business entity.
    ///
    /// Snapshots the active definition, resolves the first step's approvers,
    /// and commits the instance, its first tasks, and the opening history in
    /// one transaction. At most one active instance may exist per entity.
    #[instrument(skip(self, comments), fields(code = %code, entity_id = %entity_id), err)]
    pub async fn start_workflow(
        &self,
        code: &str,
        entity_type: &str,
        entity_id: &str,
        entity_reference: &str,
        initiator_id: Uuid,
        comments: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        let definition = self
            .definitions
            .get_by_code(code)
            .await?
            .filter(|d| d.active && !d.steps.is_empty())
            .ok_or_else(|| DomainError::UnknownWorkflowCode(code.to_string()))?;

        if definition.entity_type != entity_type {
            return Err(DomainError::ValidationFailed(format!(
                "Workflow {} governs {}, not {}",
                code, definition.entity_type, entity_type
            )));
        }
        if self.instances.find_active_for_entity(entity_type, entity_id).await?.is_some() {
            return Err(DomainError::DuplicateWorkflow {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
            });
        }

        let now = Utc::now();
        let mut instance =
            WorkflowInstance::start(&definition, entity_id, entity_reference, initiator_id, comments, now);
        let mut history = vec![HistoryEntry::new(instance.id, HistoryAction::Started, now)
            .with_actor(initiator_id)
            .with_detail(format!("{} for {}", definition.name, entity_reference))];

        let first_sequence = instance.current_sequence;
        let activation = self.activate_steps(&mut instance, first_sequence, now).await?;
        history.extend(activation.history);

        self.instances.create(&instance, &activation.tasks, &history).await?;
        info!(instance_id = %instance.id, tasks = activation.tasks.len(), "Workflow started");

        self.notify_assignments(&instance, &activation.tasks).await;
        if instance.is_terminal() {
            self.notifier.instance_finished(&instance).await;
        }
        Ok(instance)
    }

    /// Approve a task. Resolves the step per the instance's parallel mode.
    #[instrument(skip(self, comments), fields(task_id = %task_id, actor_id = %actor_id), err)]
    pub async fn approve_step(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        comments: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        self.decide(task_id, actor_id, TaskStatus::Approved, comments).await
    }

    /// Reject a task. The step flag `allow_rejection` gates this verb; when
    /// the step resolves rejected the configured rejection policy decides the
    /// instance's fate.
    #[instrument(skip(self, reason), fields(task_id = %task_id, actor_id = %actor_id), err)]
    pub async fn reject_step(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        self.decide(task_id, actor_id, TaskStatus::Rejected, reason).await
    }

    /// Pause a task while the initiator supplies more information.
    #[instrument(skip(self, question), fields(task_id = %task_id, actor_id = %actor_id), err)]
    pub async fn request_more_info(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        question: String,
    ) -> DomainResult<WorkflowInstance> {
        let now = Utc::now();
        let (mut task, mut instance) = self.load_for_action(task_id).await?;
        let instance_version = instance.version;
        Self::ensure_assignee(&task, actor_id)?;
        Self::ensure_live(&task)?;
        Self::apply_transition(&mut task, TaskStatus::InfoRequested, now, Some(question.clone()))?;
        instance.set_hold(true);

        let history = vec![HistoryEntry::new(instance.id, HistoryAction::InfoRequested, now)
            .with_step(task.step_sequence)
            .with_task(task.id)
            .with_actor(actor_id)
            .with_detail(question)];
        let write = TransitionWrite {
            acted_task: Some(GuardedTask::from_mutated(task)),
            instance: Some(GuardedInstance { instance: instance.clone(), expected_version: instance_version }),
            history,
            ..TransitionWrite::default()
        };
        self.instances.commit_transition(write).await?;
        Ok(instance)
    }

    /// Initiator answers an info request; the task returns to `Assigned` and
    /// the hold clears.
    #[instrument(skip(self, response), fields(task_id = %task_id, actor_id = %actor_id), err)]
    pub async fn provide_info(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        response: String,
    ) -> DomainResult<WorkflowInstance> {
        let now = Utc::now();
        let (mut task, mut instance) = self.load_for_action(task_id).await?;
        let instance_version = instance.version;
        if actor_id != instance.initiator_id {
            return Err(DomainError::NotAssigned { task_id, actor_id });
        }
        if task.status != TaskStatus::InfoRequested {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::Assigned.as_str().to_string(),
                reason: "only an info-requested task can receive information".to_string(),
            });
        }
        Self::apply_transition(&mut task, TaskStatus::Assigned, now, None)?;
        instance.set_hold(false);

        let history = vec![HistoryEntry::new(instance.id, HistoryAction::InfoProvided, now)
            .with_step(task.step_sequence)
            .with_task(task.id)
            .with_actor(actor_id)
            .with_detail(response)];
        let write = TransitionWrite {
            acted_task: Some(GuardedTask::from_mutated(task)),
            instance: Some(GuardedInstance { instance: instance.clone(), expected_version: instance_version }),
            history,
            ..TransitionWrite::default()
        };
        self.instances.commit_transition(write).await?;
        Ok(instance)
    }

    /// Hand a task to another employee. The original row goes terminal and a
    /// replacement row keeps the step open under the delegate.
    #[instrument(skip(self, reason), fields(task_id = %task_id, actor_id = %actor_id, delegate_id = %delegate_id), err)]
    pub async fn delegate_step(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        delegate_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        let now = Utc::now();
        let (mut task, instance) = self.load_for_action(task_id).await?;
        Self::ensure_assignee(&task, actor_id)?;
        Self::ensure_live(&task)?;

        let step = instance
            .step(task.step_sequence)
            .ok_or_else(|| DomainError::ValidationFailed(format!("no snapshot for step {}", task.step_sequence)))?;
        if !step.allow_delegation {
            return Err(DomainError::DelegationNotAllowed(task_id));
        }
        if delegate_id == actor_id {
            return Err(DomainError::InvalidDelegation("cannot delegate a task to oneself".to_string()));
        }
        let delegate = self
            .directory
            .employee(delegate_id)
            .await?
            .ok_or(DomainError::EmployeeNotFound(delegate_id))?;
        if !delegate.active {
            return Err(DomainError::InvalidDelegation(format!("delegate {} is inactive", delegate.name)));
        }

        Self::apply_transition(&mut task, TaskStatus::Delegated, now, reason.clone())?;
        let replacement = task.replacement_for(delegate_id, now, self.due_budget(step));

        let mut history = vec![HistoryEntry::new(instance.id, HistoryAction::Delegated, now)
            .with_step(task.step_sequence)
            .with_task(task.id)
            .with_actor(actor_id)
            .with_detail(reason.unwrap_or_else(|| format!("delegated to {}", delegate.name)))];
        history.push(
            HistoryEntry::new(instance.id, HistoryAction::TaskAssigned, now)
                .with_step(replacement.step_sequence)
                .with_task(replacement.id),
        );

        let write = TransitionWrite {
            acted_task: Some(GuardedTask::from_mutated(task)),
            new_tasks: vec![replacement.clone()],
            history,
            ..TransitionWrite::default()
        };
        self.instances.commit_transition(write).await?;
        self.notify_assignments(&instance, std::slice::from_ref(&replacement)).await;
        Ok(instance)
    }

    /// Cancel an in-progress instance, closing all open tasks.
    ///
    /// The only non-decision transition triggered from outside the engine.
    #[instrument(skip(self, reason), fields(instance_id = %instance_id, actor_id = %actor_id), err)]
    pub async fn cancel_workflow(
        &self,
        instance_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        let now = Utc::now();
        let mut instance = self
            .instances
            .get(instance_id)
            .await?
            .ok_or(DomainError::InstanceNotFound(instance_id))?;
        if instance.is_terminal() {
            return Err(DomainError::InstanceNotActive(instance_id));
        }
        let instance_version = instance.version;

        let mut sibling_tasks = Vec::new();
        for mut open in self.tasks.list_for_instance(instance_id).await?.into_iter().filter(ApprovalTask::is_live) {
            Self::apply_transition(&mut open, TaskStatus::Cancelled, now, None)?;
            sibling_tasks.push(GuardedTask::from_mutated(open));
        }
        instance.complete(InstanceStatus::Cancelled, now);

        let history = vec![HistoryEntry::new(instance.id, HistoryAction::Cancelled, now)
            .with_actor(actor_id)
            .with_detail(reason.unwrap_or_else(|| "cancelled".to_string()))];
        let write = TransitionWrite {
            sibling_tasks,
            instance: Some(GuardedInstance { instance: instance.clone(), expected_version: instance_version }),
            history,
            ..TransitionWrite::default()
        };
        self.instances.commit_transition(write).await?;
        self.notifier.instance_finished(&instance).await;
        Ok(instance)
    }

    /// Escalate an overdue task to a replacement assignee.
    ///
    /// Used by the escalation sweeper; goes through the same guarded write as
    /// manual actions so a concurrent decision wins cleanly.
    #[instrument(skip(self), fields(task_id = %task_id, target_id = %target_id), err)]
    pub(crate) async fn escalate_task(&self, task_id: Uuid, target_id: Uuid) -> DomainResult<ApprovalTask> {
        let now = Utc::now();
        let (mut task, instance) = self.load_for_action(task_id).await?;
        Self::ensure_live(&task)?;

        Self::apply_transition(&mut task, TaskStatus::Escalated, now, None)?;
        let due_hours = instance.step(task.step_sequence).and_then(|step| self.due_budget(step));
        let replacement = task.replacement_for(target_id, now, due_hours);

        let history = vec![
            HistoryEntry::new(instance.id, HistoryAction::Escalated, now)
                .with_step(task.step_sequence)
                .with_task(task.id)
                .with_detail(format!("overdue, escalated to {target_id}")),
            HistoryEntry::new(instance.id, HistoryAction::TaskAssigned, now)
                .with_step(replacement.step_sequence)
                .with_task(replacement.id),
        ];
        let write = TransitionWrite {
            acted_task: Some(GuardedTask::from_mutated(task)),
            new_tasks: vec![replacement.clone()],
            history,
            ..TransitionWrite::default()
        };
        self.instances.commit_transition(write).await?;
        self.notify_assignments(&instance, std::slice::from_ref(&replacement)).await;
        Ok(replacement)
    }

    async fn decide(
        &self,
        task_id: Uuid,
        actor_id: Uuid,
        decision: TaskStatus,
        comments: Option<String>,
    ) -> DomainResult<WorkflowInstance> {
        debug_assert!(decision.is_decision());
        let now = Utc::now();
        let (mut task, mut instance) = self.load_for_action(task_id).await?;
        let instance_version = instance.version;
        Self::ensure_assignee(&task, actor_id)?;
        Self::ensure_live(&task)?;

        if decision == TaskStatus::Rejected {
            let step = instance
                .step(task.step_sequence)
                .ok_or_else(|| DomainError::ValidationFailed(format!("no snapshot for step {}", task.step_sequence)))?;
            if !step.allow_rejection {
                return Err(DomainError::RejectionNotAllowed(task_id));
            }
        }

        Self::apply_transition(&mut task, decision, now, comments.clone())?;
        let sequence = task.step_sequence;

        let action = if decision == TaskStatus::Approved { HistoryAction::Approved } else { HistoryAction::Rejected };
        let mut entry = HistoryEntry::new(instance.id, action, now)
            .with_step(sequence)
            .with_task(task.id)
            .with_actor(actor_id);
        if let Some(text) = comments {
            entry = entry.with_detail(text);
        }
        let mut history = vec![entry];

        let (outcome, live_siblings) = self.resolve_step(&instance, &task).await?;

        let mut write = TransitionWrite {
            acted_task: Some(GuardedTask::from_mutated(task)),
            ..TransitionWrite::default()
        };
        // Superseded siblings carry no decision history of their own; the
        // winning decision speaks for the step.
        for mut sibling in live_siblings {
            Self::apply_transition(&mut sibling, TaskStatus::Superseded, now, None)?;
            write.sibling_tasks.push(GuardedTask::from_mutated(sibling));
        }

        let mut spawned = Vec::new();
        match outcome {
            StepOutcome::Pending => {}
            StepOutcome::Approved => {
                history.push(HistoryEntry::new(instance.id, HistoryAction::StepApproved, now).with_step(sequence));
                match instance.next_step_after(sequence).map(|s| s.sequence) {
                    Some(next) => {
                        let activation = self.activate_steps(&mut instance, next, now).await?;
                        history.extend(activation.history);
                        spawned = activation.tasks;
                        write.new_tasks.clone_from(&spawned);
                    }
                    None => {
                        instance.complete(InstanceStatus::Approved, now);
                        history.push(HistoryEntry::new(instance.id, HistoryAction::Completed, now));
                    }
                }
                write.instance =
                    Some(GuardedInstance { instance: instance.clone(), expected_version: instance_version });
            }
            StepOutcome::Rejected => {
                history.push(HistoryEntry::new(instance.id, HistoryAction::StepRejected, now).with_step(sequence));
                match self.rejection_policy.on_step_rejected(&instance, sequence) {
                    RejectionOutcome::TerminateInstance => {
                        instance.complete(InstanceStatus::Rejected, now);
                        history.push(HistoryEntry::new(instance.id, HistoryAction::InstanceRejected, now));
                    }
                    RejectionOutcome::ReturnToStep(target) => {
                        let activation = self.activate_steps(&mut instance, target, now).await?;
                        history.extend(activation.history);
                        spawned = activation.tasks;
                        write.new_tasks.clone_from(&spawned);
                    }
                }
                write.instance =
                    Some(GuardedInstance { instance: instance.clone(), expected_version: instance_version });
            }
        }
        write.history = history;

        self.instances.commit_transition(write).await?;
        self.notify_assignments(&instance, &spawned).await;
        if instance.is_terminal() {
            self.notifier.instance_finished(&instance).await;
        }
        Ok(instance)
    }

    /// Determine whether a decision resolved its step, and which live
    /// siblings it supersedes.
    async fn resolve_step(
        &self,
        instance: &WorkflowInstance,
        acted: &ApprovalTask,
    ) -> DomainResult<(StepOutcome, Vec<ApprovalTask>)> {
        let sequence = acted.step_sequence;
        let live_siblings: Vec<ApprovalTask> = self
            .tasks
            .list_live_for_step(instance.id, sequence)
            .await?
            .into_iter()
            .filter(|t| t.id != acted.id)
            .collect();

        let all_mode = instance.allow_parallel && instance.require_all;
        if all_mode && !live_siblings.is_empty() {
            // Replacements from delegation/escalation keep the step open.
            return Ok((StepOutcome::Pending, Vec::new()));
        }

        let outcome = if all_mode {
            // Only rows of the current activation count; a rework pass must
            // not inherit rejections from the pass that triggered it.
            let activated_at = instance.step(sequence).and_then(|s| s.activated_at);
            let any_rejected = acted.status == TaskStatus::Rejected
                || self
                    .tasks
                    .list_for_instance(instance.id)
                    .await?
                    .iter()
                    .any(|t| {
                        t.step_sequence == sequence
                            && t.id != acted.id
                            && t.status == TaskStatus::Rejected
                            && activated_at.map_or(true, |cutoff| t.assigned_at >= cutoff)
                    });
            if any_rejected { StepOutcome::Rejected } else { StepOutcome::Approved }
        } else if acted.status == TaskStatus::Rejected {
            StepOutcome::Rejected
        } else {
            StepOutcome::Approved
        };
        Ok((outcome, live_siblings))
    }

    /// Activate steps starting at `from_sequence`, auto-advancing through
    /// notification steps. Mutates the instance's step cache; returns the
    /// spawned tasks and history. Completes the instance when it runs off the
    /// end of the step list.
    async fn activate_steps(
        &self,
        instance: &mut WorkflowInstance,
        from_sequence: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Activation> {
        let context = ResolutionContext {
            workflow_code: instance.definition_code.clone(),
            initiator_id: instance.initiator_id,
        };
        let mut activation = Activation::default();
        let mut next = Some(from_sequence);

        while let Some(sequence) = next {
            let step = instance
                .step(sequence)
                .cloned()
                .ok_or_else(|| DomainError::ValidationFailed(format!("no snapshot for step {sequence}")))?;
            instance.advance_to(sequence, now);
            activation.history.push(
                HistoryEntry::new(instance.id, HistoryAction::StepActivated, now)
                    .with_step(sequence)
                    .with_detail(step.name.clone()),
            );

            let mut candidates = self.resolver.resolve(&step.approver, &context, now).await?;

            if !step.step_type.requires_decision() {
                // Notification step: record and move on, no tasks.
                activation.history.push(
                    HistoryEntry::new(instance.id, HistoryAction::StepApproved, now)
                        .with_step(sequence)
                        .with_detail(format!("notification step, {} recipients", candidates.len())),
                );
                next = instance.next_step_after(sequence).map(|s| s.sequence);
                continue;
            }

            if !instance.allow_parallel {
                candidates.truncate(1);
            }
            for candidate in candidates {
                let mut task = ApprovalTask::new(instance.id, sequence, candidate.employee_id, now);
                if let Some(department_id) = candidate.department_id {
                    task = task.with_department(department_id, candidate.claimable);
                }
                if let Some(hours) = self.due_budget(&step) {
                    task = task.with_due_in_hours(hours);
                }
                activation.history.push(
                    HistoryEntry::new(instance.id, HistoryAction::TaskAssigned, now)
                        .with_step(sequence)
                        .with_task(task.id),
                );
                activation.tasks.push(task);
            }
            return Ok(activation);
        }

        // Every remaining step was a notification.
        instance.complete(InstanceStatus::Approved, now);
        activation.history.push(HistoryEntry::new(instance.id, HistoryAction::Completed, now));
        Ok(activation)
    }

    async fn load_for_action(&self, task_id: Uuid) -> DomainResult<(ApprovalTask, WorkflowInstance)> {
        let task = self.tasks.get(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        let instance = self
            .instances
            .get(task.instance_id)
            .await?
            .ok_or(DomainError::InstanceNotFound(task.instance_id))?;
        if instance.is_terminal() {
            return Err(DomainError::InstanceNotActive(instance.id));
        }
        Ok((task, instance))
    }

    /// Due budget for a step's tasks: its own escalation hours, else the
    /// engine-wide fallback.
    fn due_budget(&self, step: &StepSnapshot) -> Option<u32> {
        step.escalation_hours
            .or_else(|| (self.default_escalation_hours > 0).then_some(self.default_escalation_hours))
    }

    fn ensure_assignee(task: &ApprovalTask, actor_id: Uuid) -> DomainResult<()> {
        if task.assignee_id != actor_id {
            return Err(DomainError::NotAssigned { task_id: task.id, actor_id });
        }
        Ok(())
    }

    /// A task someone else already resolved reads as a lost race.
    fn ensure_live(task: &ApprovalTask) -> DomainResult<()> {
        if !task.is_live() {
            return Err(DomainError::StaleTask(task.id));
        }
        Ok(())
    }

    fn apply_transition(
        task: &mut ApprovalTask,
        to: TaskStatus,
        now: DateTime<Utc>,
        comments: Option<String>,
    ) -> DomainResult<()> {
        let from = task.status;
        task.transition_to(to, now, comments).map_err(|reason| {
            warn!(task_id = %task.id, %reason, "Rejected task transition");
            DomainError::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
                reason,
            }
        })
    }

    async fn notify_assignments(&self, instance: &WorkflowInstance, tasks: &[ApprovalTask]) {
        let sends = tasks.iter().map(|task| self.notifier.task_assigned(task.assignee_id, instance, task));
        futures::future::join_all(sends).await;
    }
}
