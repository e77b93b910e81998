//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApprovalTask, HistoryEntry, InboxEntry, TaskStatus};
use crate::domain::ports::{InboxFilter, TaskRepository};

use super::util::{insert_history_entry, parse_datetime, parse_opt_datetime, parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn inbox_query(
        &self,
        base: &str,
        key: String,
        filter: &InboxFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InboxEntry>> {
        let mut query = base.to_string();
        let mut bindings: Vec<String> = vec![key];

        if let Some(code) = &filter.definition_code {
            query.push_str(" AND i.definition_code = ?");
            bindings.push(code.clone());
        }
        if filter.overdue_only {
            query.push_str(" AND t.due_at IS NOT NULL AND t.due_at < ?");
            bindings.push(now.to_rfc3339());
        }
        if filter.claimable_only {
            query.push_str(" AND t.claimable = 1");
        }
        query.push_str(" ORDER BY t.assigned_at");

        let mut q = sqlx::query_as::<_, InboxRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<InboxRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

const INBOX_SELECT: &str = r#"SELECT t.*, i.definition_code, i.entity_type, i.entity_reference
    FROM approval_tasks t INNER JOIN workflow_instances i ON t.instance_id = i.id
    WHERE t.status IN ('assigned', 'info_requested')"#;

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalTask>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM approval_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_instance(&self, instance_id: Uuid) -> DomainResult<Vec<ApprovalTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM approval_tasks WHERE instance_id = ? ORDER BY assigned_at, rowid",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_live_for_step(&self, instance_id: Uuid, sequence: u32) -> DomainResult<Vec<ApprovalTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT * FROM approval_tasks
               WHERE instance_id = ? AND step_sequence = ? AND status IN ('assigned', 'info_requested')
               ORDER BY assigned_at, rowid"#,
        )
        .bind(instance_id.to_string())
        .bind(i64::from(sequence))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn assigned_to(
        &self,
        user_id: Uuid,
        filter: &InboxFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InboxEntry>> {
        let base = format!("{} AND t.assignee_id = ?", INBOX_SELECT);
        self.inbox_query(&base, user_id.to_string(), filter, now).await
    }

    async fn for_department(
        &self,
        department_id: Uuid,
        filter: &InboxFilter,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<InboxEntry>> {
        let base = format!("{} AND t.department_id = ?", INBOX_SELECT);
        self.inbox_query(&base, department_id.to_string(), filter, now).await
    }

    async fn claim(&self, task_id: Uuid, claimant_id: Uuid, entry: HistoryEntry) -> DomainResult<ApprovalTask> {
        let mut tx = self.pool.begin().await?;

        // First claim wins: the guard only passes while the row is still
        // claimable and live.
        let result = sqlx::query(
            r#"UPDATE approval_tasks SET assignee_id = ?, claimable = 0, version = version + 1
               WHERE id = ? AND claimable = 1 AND status = 'assigned'"#,
        )
        .bind(claimant_id.to_string())
        .bind(task_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM approval_tasks WHERE id = ?")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return Err(match exists {
                Some(_) => DomainError::AlreadyClaimed(task_id),
                None => DomainError::TaskNotFound(task_id),
            });
        }

        insert_history_entry(&mut tx, &entry).await?;

        let row: TaskRow = sqlx::query_as("SELECT * FROM approval_tasks WHERE id = ?")
            .bind(task_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        row.try_into()
    }

    async fn list_overdue(&self, now: DateTime<Utc>, limit: u32) -> DomainResult<Vec<ApprovalTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT * FROM approval_tasks
               WHERE status = 'assigned' AND due_at IS NOT NULL AND due_at < ?
               ORDER BY due_at LIMIT ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_live(&self) -> DomainResult<u64> {
        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM approval_tasks WHERE status IN ('assigned', 'info_requested')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(result.0 as u64)
    }

    async fn count_overdue(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM approval_tasks
               WHERE status IN ('assigned', 'info_requested') AND due_at IS NOT NULL AND due_at < ?"#,
        )
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(result.0 as u64)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    instance_id: String,
    step_sequence: i64,
    assignee_id: String,
    department_id: Option<String>,
    claimable: bool,
    status: String,
    assigned_at: String,
    due_at: Option<String>,
    acted_at: Option<String>,
    comments: Option<String>,
    version: i64,
}

impl TryFrom<TaskRow> for ApprovalTask {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        Ok(ApprovalTask {
            id: parse_uuid(&row.id)?,
            instance_id: parse_uuid(&row.instance_id)?,
            step_sequence: row.step_sequence as u32,
            assignee_id: parse_uuid(&row.assignee_id)?,
            department_id: parse_opt_uuid(row.department_id.as_deref())?,
            claimable: row.claimable,
            status,
            assigned_at: parse_datetime(&row.assigned_at)?,
            due_at: parse_opt_datetime(row.due_at.as_deref())?,
            acted_at: parse_opt_datetime(row.acted_at.as_deref())?,
            comments: row.comments,
            version: row.version as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InboxRow {
    #[sqlx(flatten)]
    task: TaskRow,
    definition_code: String,
    entity_type: String,
    entity_reference: String,
}

impl TryFrom<InboxRow> for InboxEntry {
    type Error = DomainError;

    fn try_from(row: InboxRow) -> Result<Self, Self::Error> {
        Ok(InboxEntry {
            task: row.task.try_into()?,
            definition_code: row.definition_code,
            entity_type: row.entity_type,
            entity_reference: row.entity_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteDefinitionRepository, SqliteInstanceRepository,
    };
    use crate::domain::models::{
        ApproverSpec, HistoryAction, WorkflowDefinition, WorkflowInstance, WorkflowStep,
    };
    use crate::domain::ports::{DefinitionRepository, InstanceRepository};

    async fn setup() -> (SqliteTaskRepository, SqliteInstanceRepository, SqliteDefinitionRepository) {
        let pool = create_migrated_test_pool().await.unwrap();
        (
            SqliteTaskRepository::new(pool.clone()),
            SqliteInstanceRepository::new(pool.clone()),
            SqliteDefinitionRepository::new(pool),
        )
    }

    async fn seed_instance(
        definitions: &SqliteDefinitionRepository,
        instances: &SqliteInstanceRepository,
        tasks: &[ApprovalTask],
    ) -> WorkflowInstance {
        let def = WorkflowDefinition::new("leave_approval", "Leave Approval", "LeaveRequest");
        let step = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Employee(Uuid::new_v4()));
        let def = def.with_step(step);
        definitions.create(&def).await.unwrap();
        let instance = WorkflowInstance::start(&def, "42", "Leave #42", Uuid::new_v4(), None, Utc::now());
        let tasks: Vec<ApprovalTask> = tasks
            .iter()
            .cloned()
            .map(|mut t| {
                t.instance_id = instance.id;
                t
            })
            .collect();
        instances.create(&instance, &tasks, &[]).await.unwrap();
        instance
    }

    #[tokio::test]
    async fn test_assigned_to_filters() {
        let (repo, instances, definitions) = setup().await;
        let user = Uuid::new_v4();
        let overdue = ApprovalTask::new(Uuid::nil(), 1, user, Utc::now() - chrono::Duration::hours(48))
            .with_due_in_hours(24);
        let fresh = ApprovalTask::new(Uuid::nil(), 1, user, Utc::now());
        seed_instance(&definitions, &instances, &[overdue.clone(), fresh]).await;

        let all = repo.assigned_to(user, &InboxFilter::default(), Utc::now()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].definition_code, "leave_approval");

        let filter = InboxFilter { overdue_only: true, ..Default::default() };
        let only_overdue = repo.assigned_to(user, &filter, Utc::now()).await.unwrap();
        assert_eq!(only_overdue.len(), 1);
        assert_eq!(only_overdue[0].task.id, overdue.id);
    }

    #[tokio::test]
    async fn test_claim_first_wins() {
        let (repo, instances, definitions) = setup().await;
        let department = Uuid::new_v4();
        let task = ApprovalTask::new(Uuid::nil(), 1, Uuid::new_v4(), Utc::now()).with_department(department, true);
        let instance = seed_instance(&definitions, &instances, &[task.clone()]).await;

        let winner = Uuid::new_v4();
        let claimed = repo
            .claim(
                task.id,
                winner,
                HistoryEntry::new(instance.id, HistoryAction::Claimed, Utc::now()).with_task(task.id),
            )
            .await
            .unwrap();
        assert_eq!(claimed.assignee_id, winner);
        assert!(!claimed.claimable);

        let err = repo
            .claim(
                task.id,
                Uuid::new_v4(),
                HistoryEntry::new(instance.id, HistoryAction::Claimed, Utc::now()).with_task(task.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyClaimed(_)));
    }

    #[tokio::test]
    async fn test_list_overdue() {
        let (repo, instances, definitions) = setup().await;
        let overdue = ApprovalTask::new(Uuid::nil(), 1, Uuid::new_v4(), Utc::now() - chrono::Duration::hours(48))
            .with_due_in_hours(24);
        let fresh = ApprovalTask::new(Uuid::nil(), 1, Uuid::new_v4(), Utc::now()).with_due_in_hours(24);
        let undated = ApprovalTask::new(Uuid::nil(), 1, Uuid::new_v4(), Utc::now());
        seed_instance(&definitions, &instances, &[overdue.clone(), fresh, undated]).await;

        let found = repo.list_overdue(Utc::now(), 100).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, overdue.id);
        assert_eq!(repo.count_overdue(Utc::now()).await.unwrap(), 1);
        assert_eq!(repo.count_live().await.unwrap(), 3);
    }
}
