//! Audit reporting and the history-replay guarantee.

mod common;

use chrono::{Duration, Utc};
use common::{harness, leave_definition, review_definition, seed_org, Harness};
use ratify::domain::models::{ApprovalTask, InstanceStatus};
use ratify::domain::ports::{DefinitionRepository, InstanceRepository, TaskRepository};
use uuid::Uuid;

async fn live_tasks(h: &Harness, instance_id: Uuid) -> Vec<ApprovalTask> {
    h.tasks
        .list_for_instance(instance_id)
        .await
        .unwrap()
        .into_iter()
        .filter(ApprovalTask::is_live)
        .collect()
}

/// The replayed history must agree with the stored instance row.
async fn assert_replay_agrees(h: &Harness, instance_id: Uuid) {
    let stored = h.instances.get(instance_id).await.unwrap().unwrap();
    let replayed = h.reporting.replayed_state(instance_id).await.unwrap();
    assert_eq!(replayed.status, stored.status);
    assert_eq!(replayed.current_sequence, stored.current_sequence);
    assert_eq!(replayed.on_hold, stored.on_hold);
}

#[tokio::test]
async fn test_replay_agrees_with_stored_row_across_transitions() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "40", "Leave #40", org.initiator.id, None)
        .await
        .unwrap();
    assert_replay_agrees(&h, instance.id).await;

    let open = live_tasks(&h, instance.id).await;
    h.orchestrator
        .request_more_info(open[0].id, org.manager.id, "half day or full?".into())
        .await
        .unwrap();
    assert_replay_agrees(&h, instance.id).await;

    h.orchestrator.provide_info(open[0].id, org.initiator.id, "full days".into()).await.unwrap();
    assert_replay_agrees(&h, instance.id).await;

    h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();
    assert_replay_agrees(&h, instance.id).await;

    let open = live_tasks(&h, instance.id).await;
    h.orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
    assert_replay_agrees(&h, instance.id).await;

    let replayed = h.reporting.replayed_state(instance.id).await.unwrap();
    assert_eq!(replayed.status, InstanceStatus::Approved);
}

#[tokio::test]
async fn test_replay_agrees_for_rejected_and_cancelled_runs() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let rejected = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "41", "Leave #41", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, rejected.id).await;
    h.orchestrator.reject_step(open[0].id, org.manager.id, Some("no cover".into())).await.unwrap();
    assert_replay_agrees(&h, rejected.id).await;

    let cancelled = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "42", "Leave #42", org.initiator.id, None)
        .await
        .unwrap();
    h.orchestrator.cancel_workflow(cancelled.id, org.initiator.id, None).await.unwrap();
    assert_replay_agrees(&h, cancelled.id).await;
}

#[tokio::test]
async fn test_audit_report_builds_per_step_timelines() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "43", "Leave #43", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    h.orchestrator.approve_step(open[0].id, org.manager.id, Some("approved".into())).await.unwrap();

    let report = h.reporting.audit_report(instance.id).await.unwrap();
    assert_eq!(report.definition_code, "leave_approval");
    assert_eq!(report.entity_reference, "Leave #43");
    assert_eq!(report.status, InstanceStatus::InProgress);
    assert_eq!(report.steps.len(), 2);

    let manager_step = &report.steps[0];
    assert_eq!(manager_step.sequence, 1);
    assert_eq!(manager_step.outcome, Some("approved"));
    assert!(manager_step.activated_at.is_some());
    assert!(manager_step.resolved_at.is_some());
    assert!(manager_step.duration_hours.unwrap() >= 0.0);
    assert!(!manager_step.actions.is_empty());

    let hr_step = &report.steps[1];
    assert_eq!(hr_step.outcome, None);
    assert!(hr_step.activated_at.is_some());
    assert!(hr_step.resolved_at.is_none());
}

#[tokio::test]
async fn test_dashboard_counts_live_work() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();
    h.definitions.create(&review_definition(org.hr_role.id, false)).await.unwrap();

    h.orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "44", "Leave #44", org.initiator.id, None)
        .await
        .unwrap();
    h.orchestrator
        .start_workflow("expense_review", "ExpenseReport", "45", "Expense #45", org.initiator.id, None)
        .await
        .unwrap();

    let dashboard = h.reporting.dashboard().await.unwrap();
    assert_eq!(dashboard.in_progress_instances, 2);
    assert_eq!(dashboard.on_hold_instances, 0);
    // One manager task plus the parallel fan-out of two reviewers.
    assert_eq!(dashboard.open_tasks, 3);
    assert_eq!(dashboard.overdue_tasks, 0);
    assert_eq!(dashboard.per_definition.get("leave_approval"), Some(&1));
    assert_eq!(dashboard.per_definition.get("expense_review"), Some(&1));
}

#[tokio::test]
async fn test_statistics_over_a_period() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    // One approved, one rejected, one still in progress.
    for (entity, decide) in [("50", Some(true)), ("51", Some(false)), ("52", None)] {
        let instance = h
            .orchestrator
            .start_workflow("leave_approval", "LeaveRequest", entity, entity, org.initiator.id, None)
            .await
            .unwrap();
        if let Some(approve) = decide {
            let open = live_tasks(&h, instance.id).await;
            if approve {
                h.orchestrator.approve_step(open[0].id, org.manager.id, None).await.unwrap();
                let open = live_tasks(&h, instance.id).await;
                h.orchestrator.approve_step(open[0].id, open[0].assignee_id, None).await.unwrap();
            } else {
                h.orchestrator.reject_step(open[0].id, org.manager.id, None).await.unwrap();
            }
        }
    }

    let now = Utc::now();
    let stats = h.reporting.statistics(now - Duration::hours(1), now + Duration::hours(1)).await.unwrap();
    assert_eq!(stats.started, 3);
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.cancelled, 0);
    assert!((stats.approval_rate - 0.5).abs() < f64::EPSILON);
    assert!(stats.avg_completion_hours.unwrap() >= 0.0);

    // Outside the window nothing is counted.
    let empty = h.reporting.statistics(now - Duration::days(30), now - Duration::days(29)).await.unwrap();
    assert_eq!(empty.started, 0);
    assert_eq!(empty.approval_rate, 0.0);
}

#[tokio::test]
async fn test_history_requires_a_known_instance() {
    let h = harness().await;
    seed_org(&h).await;

    let err = h.reporting.workflow_history(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ratify::DomainError::InstanceNotFound(_)));
}
