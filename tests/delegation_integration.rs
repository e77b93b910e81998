//! Standing delegations applied during approver resolution.

mod common;

use chrono::{Duration, Utc};
use common::{harness, leave_definition, seed_org};
use ratify::domain::models::ApprovalTask;
use ratify::domain::ports::{DefinitionRepository, TaskRepository};
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
async fn test_standing_delegation_substitutes_assignee() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let now = Utc::now();
    h.delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, now - Duration::hours(1), now + Duration::days(7))
        .await
        .unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "30", "Leave #30", org.initiator.id, None)
        .await
        .unwrap();

    // The manager step lands on the delegate instead.
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].assignee_id, org.outsider.id);
}

#[tokio::test]
async fn test_delegation_is_never_followed_transitively() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let now = Utc::now();
    let window = (now - Duration::hours(1), now + Duration::days(7));
    h.delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, window.0, window.1)
        .await
        .unwrap();
    // The delegate has a delegation of their own; it must not chain.
    h.delegation_service
        .create_delegation(org.outsider.id, org.hr_one.id, None, window.0, window.1)
        .await
        .unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "31", "Leave #31", org.initiator.id, None)
        .await
        .unwrap();

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open[0].assignee_id, org.outsider.id, "one hop only");
}

#[tokio::test]
async fn test_workflow_scoped_delegation_beats_global() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let now = Utc::now();
    let window = (now - Duration::hours(1), now + Duration::days(7));
    h.delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, window.0, window.1)
        .await
        .unwrap();
    h.delegation_service
        .create_delegation(
            org.manager.id,
            org.hr_one.id,
            Some("leave_approval".into()),
            window.0,
            window.1,
        )
        .await
        .unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "32", "Leave #32", org.initiator.id, None)
        .await
        .unwrap();

    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open[0].assignee_id, org.hr_one.id);
}

#[tokio::test]
async fn test_cancelled_delegation_stops_applying() {
    let h = harness().await;
    let org = seed_org(&h).await;
    h.definitions.create(&leave_definition(org.hr_role.id)).await.unwrap();

    let now = Utc::now();
    let delegation = h
        .delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, now - Duration::hours(1), now + Duration::days(7))
        .await
        .unwrap();

    // Only the delegator may cancel.
    let err = h.delegation_service.cancel_delegation(delegation.id, org.outsider.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidDelegation(_)));
    h.delegation_service.cancel_delegation(delegation.id, org.manager.id).await.unwrap();

    let instance = h
        .orchestrator
        .start_workflow("leave_approval", "LeaveRequest", "33", "Leave #33", org.initiator.id, None)
        .await
        .unwrap();
    let open = live_tasks(&h, instance.id).await;
    assert_eq!(open[0].assignee_id, org.manager.id);

    assert!(h.delegation_service.active_delegations(org.manager.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_delegation_validation() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let now = Utc::now();
    let err = h
        .delegation_service
        .create_delegation(org.manager.id, org.manager.id, None, now, now + Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidDelegation(_)));

    let err = h
        .delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, now + Duration::days(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidDelegation(_)));

    let err = h
        .delegation_service
        .create_delegation(org.manager.id, Uuid::new_v4(), None, now, now + Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EmployeeNotFound(_)));
}

#[tokio::test]
async fn test_active_delegations_lists_both_sides() {
    let h = harness().await;
    let org = seed_org(&h).await;

    let now = Utc::now();
    h.delegation_service
        .create_delegation(org.manager.id, org.outsider.id, None, now - Duration::hours(1), now + Duration::days(7))
        .await
        .unwrap();

    let as_delegator = h.delegation_service.active_delegations(org.manager.id).await.unwrap();
    assert_eq!(as_delegator.len(), 1);
    let as_delegate = h.delegation_service.active_delegations(org.outsider.id).await.unwrap();
    assert_eq!(as_delegate.len(), 1);
    assert!(h.delegation_service.active_delegations(org.hr_one.id).await.unwrap().is_empty());
}
