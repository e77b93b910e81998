//! Escalation sweep behavior: reassignment, reminders, and idempotence.

mod common;

use common::{harness, make_overdue, seed_org};
use ratify::domain::models::{
    ApprovalTask, ApproverSpec, InstanceStatus, TaskStatus, WorkflowDefinition, WorkflowStep,
};
use ratify::domain::ports::{DefinitionRepository, InstanceRepository, TaskRepository};
use uuid::Uuid;

fn escalating_definition(assignee: Uuid, escalation_role: Option<Uuid>) -> WorkflowDefinition {
    let def = WorkflowDefinition::new("contract_signoff", "Contract Signoff", "Contract");
    let step = WorkflowStep::new(def.id, 1, "Signoff", ApproverSpec::Employee(assignee))
        .with_escalation(24, escalation_role);
    def.with_step(step)
}

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
async fn test_sweep_escalates_overdue_task_to_role_member() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions
        .create(&escalating_definition(org.manager.id, Some(org.hr_role.id)))
        .await
        .unwrap();

    let instance = h
        .orchestrator
        .start_workflow("contract_signoff", "Contract", "c-10", "Contract c-10", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    let original_id = open[0].id;
    make_overdue(&h.pool, original_id).await;

    let report = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.escalated, 1);
    assert_eq!(report.failed, 0);

    let original = h.tasks.get(original_id).await.unwrap().unwrap();
    assert_eq!(original.status, TaskStatus::Escalated);

    // A replacement row keeps the step open under a role member, with a
    // fresh due budget.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert!([org.hr_one.id, org.hr_two.id].contains(&open[0].assignee_id));
    assert!(open[0].due_at.unwrap() > chrono::Utc::now());

    // The escalation assignee can resolve the step.
    let done = h.orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions
        .create(&escalating_definition(org.manager.id, Some(org.hr_role.id)))
        .await
        .unwrap();

    let instance = h
        .orchestrator
        .start_workflow("contract_signoff", "Contract", "c-11", "Contract c-11", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    make_overdue(&h.pool, open[0].id).await;

    let first = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(first.escalated, 1);

    // The replacement's due time is back in the future, so a second sweep
    // finds nothing to do.
    let second = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(second.scanned, 0);
    assert_eq!(second.escalated, 0);

    assert_eq!(live_tasks(&h, instance.id).await.len(), 1);
}

#[tokio::test]
async fn test_sweep_reminds_when_no_escalation_role() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&escalating_definition(org.manager.id, None)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("contract_signoff", "Contract", "c-12", "Contract c-12", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    make_overdue(&h.pool, open[0].id).await;

    let report = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.reminded, 1);
    assert_eq!(report.escalated, 0);

    // The task stays with the original assignee.
    let task = h.tasks.get(open[0].id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Assigned);
    assert_eq!(task.assignee_id, org.manager.id);
}

#[tokio::test]
async fn test_escalation_target_honors_standing_delegations() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions
        .create(&escalating_definition(org.manager.id, Some(org.hr_role.id)))
        .await
        .unwrap();

    // Every role member is away and delegating; the escalation must land on
    // the delegate, not the absent members.
    let now = chrono::Utc::now();
    for member in [org.hr_one.id, org.hr_two.id] {
        h.delegation_service
            .create_delegation(
                member,
                org.outsider.id,
                None,
                now - chrono::Duration::hours(1),
                now + chrono::Duration::days(7),
            )
            .await
            .unwrap();
    }

    let instance = h
        .orchestrator
        .start_workflow("contract_signoff", "Contract", "c-13", "Contract c-13", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    make_overdue(&h.pool, open[0].id).await;

    let report = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(report.escalated, 1);

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].assignee_id, org.outsider.id);
}

#[tokio::test]
async fn test_escalation_in_all_mode_keeps_step_open() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let def = WorkflowDefinition::new("audit_review", "Audit Review", "AuditFinding")
        .with_parallel_approval(true);
    let step = WorkflowStep::new(def.id, 1, "Reviewers", ApproverSpec::Role(org.hr_role.id))
        .with_escalation(24, Some(org.hr_role.id));
    h.definitions.create(&def.with_step(step)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("audit_review", "AuditFinding", "a-1", "Finding a-1", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 2);

    let first = open.iter().find(|t| t.assignee_id == org.hr_one.id).unwrap();
    h.orchestrator.approve_step(first.id, org.hr_one.id, None).await.unwrap();

    let laggard = live_tasks(&h, instance.id).await;
    assert_eq!(laggard.len(), 1);
    make_overdue(&h.pool, laggard[0].id).await;

    let report = h.escalation.process_overdue_steps().await.unwrap();
    assert_eq!(report.escalated, 1);

    // The replacement still counts toward the all-mode quorum.
    let stored = h.instances.get(instance.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InstanceStatus::InProgress);

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    let done = h.orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
    assert_eq!(done.status, InstanceStatus::Approved);
}
