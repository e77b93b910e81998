//! End-to-end workflow progression over the SQLite adapters.

mod common;

use std::sync::Arc;

use common::{harness, leave_definition, review_definition, seed_org};
use ratify::adapters::LogNotifier;
use ratify::domain::models::{
    ApprovalTask, ApproverSpec, HistoryAction, InstanceStatus, TaskStatus, WorkflowDefinition,
    WorkflowInstance, WorkflowStep,
};
use ratify::domain::ports::{DefinitionRepository, HistoryRepository, InstanceRepository, TaskRepository};
use ratify::services::{ApproverResolver, RejectionOutcome, RejectionPolicy, WorkflowOrchestrator};
use ratify::DomainError;
use uuid::Uuid;

async fn live_tasks(h: &common::Harness, instance_id: Uuid) -> Vec<ApprovalTask> {
    h.tasks
        .list_for_instance(instance_id)
        .await
        .unwrap()
        .into_iter()
        .filter(ApprovalTask::is_live)
        .collect()
}

#[tokio::test]
async fn test_sequential_workflow_approves_through_both_steps() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "42", "Leave #42", org.initiator.id, None)
        .await
        .unwrap();
    assert_eq!(instance.status, InstanceStatus::InProgress);
    assert_eq!(instance.current_sequence, 1);

    // Step 1 resolves initiator.manager to exactly one task.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].assignee_id, org.manager.id);

    let after_manager = h
        .orchestrator
        .approve_step(open[0].id, org.manager.id, Some("fine by me".into()))
        .await
        .unwrap();
    assert_eq!(after_manager.status, InstanceStatus::InProgress);
    assert_eq!(after_manager.current_sequence, 2);

    // Step 2 is sequential over a role: exactly one HR member gets the task.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert!([org.hr_one.id, org.hr_two.id].contains(&open[0].assignee_id));

    let done = h.orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
    assert!(done.completed_at.is_some());

    let stored = h.instances.get(instance.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::Approved);

    let trail = h.history.for_instance(instance.id).await.unwrap();
    let actions: Vec<HistoryAction> = trail.iter().map(|e| e.action).collect();
    assert!(actions.contains(&HistoryAction::Started));
    assert!(actions.contains(&HistoryAction::StepApproved));
    assert_eq!(actions.last(), Some(&HistoryAction::Completed));
}

#[tokio::test]
async fn test_rejection_terminates_instance_by_default() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "7", "Leave #7", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let rejected = h
        .orchestrator
        .reject_step(open[0].id, org.manager.id, Some("dates clash with the audit".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, InstanceStatus::Rejected);

    // No HR task was ever spawned.
    let all = h.tasks.list_for_instance(instance.id).await.unwrap();
    assert!(all.iter().all(|t| t.step_sequence == 1));

    let trail = h.history.for_instance(instance.id).await.unwrap();
    assert!(trail.iter().any(|e| e.action == HistoryAction::StepRejected));
    assert_eq!(trail.last().unwrap().action, HistoryAction::InstanceRejected);
}

#[tokio::test]
async fn test_start_rejects_bad_inputs() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let err = h
        .orchestrator
        .start_workflow("no_such_flow", "LeaveRequest", "1", "x", org.initiator.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UnknownWorkflowCode(_)));

    let err = h
        .orchestrator
        .start_workflow("leave_approval", "ExpenseReport", "1", "x", org.initiator.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ValidationFailed(_)));

    h.orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "1", "Leave #1", org.initiator.id, None)
        .await
        .unwrap();
    let err = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "1", "Leave #1", org.initiator.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DuplicateWorkflow { .. }));
}

#[tokio::test]
async fn test_start_fails_when_no_approver_resolves() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    // The manager is the only employee with no manager of their own.
    let err = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "9", "Leave #9", org.manager.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UnresolvedApprover(_)));

    // Nothing was persisted.
    assert!(h
        .instances
        .find_active_for_entity("LeaveRequest", "9")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_any_mode_first_decision_wins_and_supersedes_siblings() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&review_definition(org.hr_role.id, false)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("expense_review", "ExpenseReport", "3", "Expense #3", org.initiator.id, None)
        .await
        .unwrap();

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 2, "parallel step fans out to every role member");

    let winner = open.iter().find(|t| t.assignee_id == org.hr_one.id).unwrap();
    let done = h.orchestrator.approve_step(winner.id, org.hr_one.id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);

    let all = h.tasks.list_for_instance(instance.id).await.unwrap();
    let sibling = all.iter().find(|t| t.assignee_id == org.hr_two.id).unwrap();
    assert_eq!(sibling.status, TaskStatus::Superseded);

    // The winning decision speaks for the step; the superseded sibling left
    // no decision entry of its own.
    let trail = h.history.for_instance(instance.id).await.unwrap();
    let decisions: Vec<_> = trail.iter().filter(|e| e.action == HistoryAction::Approved).collect();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].actor_id, Some(org.hr_one.id));

    // The loser's approval now reads as a lost race.
    let err = h.orchestrator.approve_step(sibling.id, org.hr_two.id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::InstanceNotActive(_) | DomainError::StaleTask(_)));
}

#[tokio::test]
async fn test_all_mode_waits_for_every_approver() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&review_definition(org.hr_role.id, true)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("expense_review", "ExpenseReport", "4", "Expense #4", org.initiator.id, None)
        .await
        .unwrap();

    let open = live_tasks(&h, instance.id).await;
    let first = open.iter().find(|t| t.assignee_id == org.hr_one.id).unwrap();
    let mid = h.orchestrator.approve_step(first.id, org.hr_one.id, None).await.unwrap();
    assert_eq!(mid.status, InstanceStatus::InProgress, "one approval does not resolve an all-mode step");

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    let done = h.orchestrator.approve_step(open[0].id, org.hr_two.id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_all_mode_rejects_when_any_approver_rejects() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&review_definition(org.hr_role.id, true)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("expense_review", "ExpenseReport", "5", "Expense #5", org.initiator.id, None)
        .await
        .unwrap();

    let open = live_tasks(&h, instance.id).await;
    let first = open.iter().find(|t| t.assignee_id == org.hr_one.id).unwrap();
    h.orchestrator.reject_step(first.id, org.hr_one.id, Some("no receipt".into())).await.unwrap();

    // Step stays open for the other approver; their approval cannot save it.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    let done = h.orchestrator.approve_step(open[0].id, org.hr_two.id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Rejected);
}

/// Rejections send the instance back to the same step for rework.
struct ReworkSameStep;

impl RejectionPolicy for ReworkSameStep {
    fn on_step_rejected(&self, _instance: &WorkflowInstance, sequence: u32) -> RejectionOutcome {
        RejectionOutcome::ReturnToStep(sequence)
    }
}

#[tokio::test]
async fn test_rework_pass_starts_clean_after_all_mode_rejection() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&review_definition(org.hr_role.id, true)).await.unwrap();

    let resolver = ApproverResolver::new(h.directory.clone(), h.delegations.clone());
    let orchestrator = WorkflowOrchestrator::new(
        h.definitions.clone(),
        h.instances.clone(),
        h.tasks.clone(),
        h.directory.clone(),
        resolver,
        Arc::new(LogNotifier::new()),
    )
    .with_rejection_policy(Arc::new(ReworkSameStep));

    let instance = orchestrator
        .start_workflow("expense_review", "ExpenseReport", "6", "Expense #6", org.initiator.id, None)
        .await
        .unwrap();

    // First pass: one approval, one rejection; the step reactivates.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 2);
    orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
    let after = orchestrator
        .reject_step(open[1].id, open[1].assignee_id, Some("rework".into()))
        .await
        .unwrap();
    assert_eq!(after.status, InstanceStatus::InProgress);

    // Rework pass: the earlier rejection must not taint it, so unanimous
    // approvals resolve the step.
    let rework = live_tasks(&h, instance.id).await;
    assert_eq!(rework.len(), 2);
    let mid = orchestrator.approve_step(rework[0].id, rework[0].assignee_id, None).await.unwrap();
    assert_eq!(mid.status, InstanceStatus::InProgress);
    let done = orchestrator.approve_step(rework[1].id, rework[1].assignee_id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_only_the_assignee_may_act() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "8", "Leave #8", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let err = h.orchestrator.approve_step(open[0].id, org.outsider.id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::NotAssigned { .. }));

    // The instance is untouched.
    let stored = h.instances.get(instance.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::InProgress);
}

#[tokio::test]
async fn test_second_decision_on_resolved_task_is_stale() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "10", "Leave #10", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();

    let err = h.orchestrator.reject_step(open[0].id, org.manager.id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::StaleTask(_)));
}

#[tokio::test]
async fn test_info_request_holds_and_resumes_the_instance() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "11", "Leave #11", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let held = h
        .orchestrator
        .request_more_info(open[0].id, org.manager.id, "which dates exactly?".into())
        .await
        .unwrap();
    assert!(held.on_hold);
    let task = h.tasks.get(open[0].id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::InfoRequested);

    // Only the initiator may answer.
    let err = h
        .orchestrator
        .provide_info(open[0].id, org.outsider.id, "March 3-7".into())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotAssigned { .. }));

    let resumed = h
        .orchestrator
        .provide_info(open[0].id, org.initiator.id, "March 3-7".into())
        .await
        .unwrap();
    assert!(!resumed.on_hold);
    let task = h.tasks.get(open[0].id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);

    // An answer without an open question is invalid.
    let err = h
        .orchestrator
        .provide_info(open[0].id, org.initiator.id, "again".into())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

    // The approver can now decide normally.
    let done = h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();
    assert_eq!(done.current_sequence, 2);
}

#[tokio::test]
async fn test_delegate_step_reassigns_the_task() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "12", "Leave #12", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let err = h
        .orchestrator
        .delegate_step(open[0].id, org.manager.id, org.manager.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidDelegation(_)));

    h.orchestrator
        .delegate_step(open[0].id, org.manager.id, org.outsider.id, Some("on leave myself".into()))
        .await
        .unwrap();

    let original = h.tasks.get(open[0].id).await.unwrap().unwrap();
    assert_eq!(original.status, TaskStatus::Delegated);

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].assignee_id, org.outsider.id);
    assert_eq!(open[0].step_sequence, 1);

    // The delegate's decision advances the workflow.
    let after = h.orchestrator.approve_step(open[0].id, org.outsider.id, None).await.unwrap();
    assert_eq!(after.current_sequence, 2);
}

#[tokio::test]
async fn test_delegation_respects_step_flag() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let def = WorkflowDefinition::new("strict_signoff", "Strict Signoff", "Contract");
    let step = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Employee(org.manager.id))
        .without_delegation();
    h.definitions.create(&def.with_step(step)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("strict_signoff", "Contract", "c-1", "Contract c-1", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let err = h
        .orchestrator
        .delegate_step(open[0].id, org.manager.id, org.outsider.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DelegationNotAllowed(_)));
}

#[tokio::test]
async fn test_rejection_respects_step_flag() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let def = WorkflowDefinition::new("ack_only", "Acknowledge Only", "Notice");
    let step = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Employee(org.manager.id))
        .without_rejection();
    h.definitions.create(&def.with_step(step)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("ack_only", "Notice", "n-1", "Notice n-1", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    let err = h.orchestrator.reject_step(open[0].id, org.manager.id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::RejectionNotAllowed(_)));

    let done = h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_cancel_closes_all_open_tasks() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&review_definition(org.hr_role.id, true)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("expense_review", "ExpenseReport", "6", "Expense #6", org.initiator.id, None)
        .await
        .unwrap();
    assert_eq!(live_tasks(&h, instance.id).await.len(), 2);

    let cancelled = h
        .orchestrator
        .cancel_workflow(instance.id, org.initiator.id, Some("withdrawn".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, InstanceStatus::Cancelled);
    assert!(live_tasks(&h, instance.id).await.is_empty());

    let all = h.tasks.list_for_instance(instance.id).await.unwrap();
    assert!(all.iter().all(|t| t.status == TaskStatus::Cancelled));

    // A cancelled instance admits nothing further.
    let err = h.orchestrator.cancel_workflow(instance.id, org.initiator.id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::InstanceNotActive(_)));
    let err = h.orchestrator.approve_step(all[0].id, all[0].assignee_id, None).await.unwrap_err();
    assert!(matches!(err, DomainError::InstanceNotActive(_)));

    // The entity is free for a fresh run.
    h.orchestrator
        .start_workflow("expense_review", "ExpenseReport", "6", "Expense #6", org.initiator.id, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_notification_steps_auto_advance() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let def = WorkflowDefinition::new("onboarding", "Onboarding", "Hire");
    let approve = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Employee(org.manager.id));
    let notify = WorkflowStep::new(def.id, 2, "Notify HR", ApproverSpec::Role(org.hr_role.id))
        .with_type(ratify::StepType::Notification);
    h.definitions.create(&def.with_step(approve).with_step(notify)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("onboarding", "Hire", "h-1", "Hire h-1", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;

    // Approving step 1 sails through the trailing notification step.
    let done = h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);

    // The notification step produced history but no tasks.
    let all = h.tasks.list_for_instance(instance.id).await.unwrap();
    assert!(all.iter().all(|t| t.step_sequence == 1));
    let trail = h.history.for_instance(instance.id).await.unwrap();
    assert!(trail
        .iter()
        .any(|e| e.action == HistoryAction::StepActivated && e.step_sequence == Some(2)));
}
