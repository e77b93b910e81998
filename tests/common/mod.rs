//! Shared setup for integration tests: an in-memory database, the full
//! service graph, and a small seeded organization.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use ratify::adapters::sqlite::{
    create_migrated_test_pool, SqliteDefinitionRepository, SqliteDelegationRepository,
    SqliteDirectory, SqliteHistoryRepository, SqliteInstanceRepository, SqliteTaskRepository,
};
use ratify::adapters::LogNotifier;
use ratify::domain::models::{
    ApproverSpec, Department, Employee, Role, WorkflowDefinition, WorkflowStep,
};
use ratify::services::{
    ApproverResolver, DelegationService, EscalationService, ReportingService, TaskQueueService,
    WorkflowOrchestrator,
};

pub struct Harness {
    pub pool: SqlitePool,
    pub directory: Arc<SqliteDirectory>,
    pub definitions: Arc<SqliteDefinitionRepository>,
    pub instances: Arc<SqliteInstanceRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub delegations: Arc<SqliteDelegationRepository>,
    pub history: Arc<SqliteHistoryRepository>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub task_queue: Arc<TaskQueueService>,
    pub escalation: EscalationService,
    pub delegation_service: DelegationService,
    pub reporting: ReportingService,
}

pub async fn harness() -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");

    let directory = Arc::new(SqliteDirectory::new(pool.clone()));
    let definitions = Arc::new(SqliteDefinitionRepository::new(pool.clone()));
    let instances = Arc::new(SqliteInstanceRepository::new(pool.clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let delegations = Arc::new(SqliteDelegationRepository::new(pool.clone()));
    let history = Arc::new(SqliteHistoryRepository::new(pool.clone()));
    let notifier = Arc::new(LogNotifier::new());

    let resolver = ApproverResolver::new(directory.clone(), delegations.clone());
    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        definitions.clone(),
        instances.clone(),
        tasks.clone(),
        directory.clone(),
        resolver,
        notifier.clone(),
    ));
    let task_queue = Arc::new(TaskQueueService::new(tasks.clone(), directory.clone()));
    let escalation = EscalationService::new(
        tasks.clone(),
        instances.clone(),
        ApproverResolver::new(directory.clone(), delegations.clone()),
        notifier,
        orchestrator.clone(),
        100,
    );
    let delegation_service = DelegationService::new(delegations.clone(), directory.clone());
    let reporting = ReportingService::new(instances.clone(), tasks.clone(), history.clone());

    Harness {
        pool,
        directory,
        definitions,
        instances,
        tasks,
        delegations,
        history,
        orchestrator,
        task_queue,
        escalation,
        delegation_service,
        reporting,
    }
}

/// A small seeded organization used across scenarios.
pub struct Org {
    pub manager: Employee,
    pub initiator: Employee,
    pub hr_role: Role,
    pub hr_one: Employee,
    pub hr_two: Employee,
    pub finance: Department,
    pub finance_head: Employee,
    pub finance_member: Employee,
    pub outsider: Employee,
}

pub async fn seed_org(h: &Harness) -> Org {
    let manager = Employee::new("Mara Voss", "mara@clinic.example");
    let initiator = Employee::new("Iris Tan", "iris@clinic.example").with_manager(manager.id);

    let hr_role = Role::new("HR", "Human Resources");
    let hr_one = Employee::new("Hugo Reyes", "hugo@clinic.example");
    let hr_two = Employee::new("Hana Sato", "hana@clinic.example");

    let finance_head = Employee::new("Frida Berg", "frida@clinic.example");
    let finance = Department::new("Finance").with_head(finance_head.id);
    let finance_head = finance_head.with_department(finance.id);
    let finance_member = Employee::new("Femi Ade", "femi@clinic.example").with_department(finance.id);

    let outsider = Employee::new("Omar Nye", "omar@clinic.example");

    // Departments and roles first; employee rows reference them.
    h.directory.upsert_department(&finance).await.expect("seed department");
    h.directory.upsert_role(&hr_role).await.expect("seed role");
    for employee in [&manager, &initiator, &hr_one, &hr_two, &finance_head, &finance_member, &outsider] {
        h.directory.upsert_employee(employee).await.expect("seed employee");
    }
    h.directory.assign_role(hr_role.id, hr_one.id).await.expect("assign role");
    h.directory.assign_role(hr_role.id, hr_two.id).await.expect("assign role");

    Org { manager, initiator, hr_role, hr_one, hr_two, finance, finance_head, finance_member, outsider }
}

/// Sequential leave approval: manager first, then an HR member.
pub fn leave_definition(hr_role: Uuid) -> WorkflowDefinition {
    let def = WorkflowDefinition::new("leave_approval", "Leave Approval", "LeaveRequest");
    let manager = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Expression("initiator.manager".into()));
    let hr = WorkflowStep::new(def.id, 2, "HR", ApproverSpec::Role(hr_role));
    def.with_step(manager).with_step(hr)
}

/// Single parallel step over a role, any- or all-mode.
pub fn review_definition(role: Uuid, require_all: bool) -> WorkflowDefinition {
    let def = WorkflowDefinition::new("expense_review", "Expense Review", "ExpenseReport")
        .with_parallel_approval(require_all);
    let step = WorkflowStep::new(def.id, 1, "Reviewers", ApproverSpec::Role(role));
    def.with_step(step)
}

/// Push a live task's due time into the past so a sweep sees it as overdue.
pub async fn make_overdue(pool: &SqlitePool, task_id: Uuid) {
    let past = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    sqlx::query("UPDATE approval_tasks SET due_at = ? WHERE id = ?")
        .bind(past)
        .bind(task_id.to_string())
        .execute(pool)
        .await
        .expect("set due_at");
}
