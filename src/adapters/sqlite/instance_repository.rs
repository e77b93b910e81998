//! SQLite implementation of the InstanceRepository.
//!
//! `commit_transition` is the engine's single transactional write path:
//! guarded task updates, spawned rows, the instance row, and the history
//! entries all commit or roll back together.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ApprovalTask, HistoryEntry, InstanceStatus, StepSnapshot, WorkflowInstance,
};
use crate::domain::ports::{GuardedTask, InstanceRepository, TransitionWrite};

use super::util::{insert_history_entry, insert_task, parse_datetime, parse_opt_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteInstanceRepository {
    pool: SqlitePool,
}

impl SqliteInstanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Guarded UPDATE of one task row. Zero rows affected means a concurrent
    /// writer won the race.
    async fn update_task_guarded(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        guarded: &GuardedTask,
    ) -> DomainResult<bool> {
        let task = &guarded.task;
        let result = sqlx::query(
            r#"UPDATE approval_tasks SET assignee_id = ?, claimable = ?, status = ?,
               acted_at = ?, comments = ?, version = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(task.assignee_id.to_string())
        .bind(task.claimable)
        .bind(task.status.as_str())
        .bind(task.acted_at.map(|t| t.to_rfc3339()))
        .bind(&task.comments)
        .bind(task.version as i64)
        .bind(task.id.to_string())
        .bind(guarded.expected_version as i64)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl InstanceRepository for SqliteInstanceRepository {
    async fn create(
        &self,
        instance: &WorkflowInstance,
        tasks: &[ApprovalTask],
        history: &[HistoryEntry],
    ) -> DomainResult<()> {
        let steps_json = serde_json::to_string(&instance.steps)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO workflow_instances (id, definition_id, definition_code, entity_type,
               entity_id, entity_reference, initiator_id, initiator_comments, status,
               current_sequence, on_hold, allow_parallel, require_all, steps, started_at,
               completed_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(instance.id.to_string())
        .bind(instance.definition_id.to_string())
        .bind(&instance.definition_code)
        .bind(&instance.entity_type)
        .bind(&instance.entity_id)
        .bind(&instance.entity_reference)
        .bind(instance.initiator_id.to_string())
        .bind(&instance.initiator_comments)
        .bind(instance.status.as_str())
        .bind(i64::from(instance.current_sequence))
        .bind(instance.on_hold)
        .bind(instance.allow_parallel)
        .bind(instance.require_all)
        .bind(&steps_json)
        .bind(instance.started_at.to_rfc3339())
        .bind(instance.completed_at.map(|t| t.to_rfc3339()))
        .bind(instance.version as i64)
        .execute(&mut *tx)
        .await?;

        for task in tasks {
            insert_task(&mut tx, task).await?;
        }
        for entry in history {
            insert_history_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowInstance>> {
        let row: Option<InstanceRow> = sqlx::query_as("SELECT * FROM workflow_instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_active_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> DomainResult<Option<WorkflowInstance>> {
        let row: Option<InstanceRow> = sqlx::query_as(
            r#"SELECT * FROM workflow_instances
               WHERE entity_type = ? AND entity_id = ? AND status = 'in_progress'"#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn commit_transition(&self, write: TransitionWrite) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(acted) = &write.acted_task {
            if !Self::update_task_guarded(&mut tx, acted).await? {
                tx.rollback().await?;
                return Err(DomainError::StaleTask(acted.task.id));
            }
        }

        for sibling in &write.sibling_tasks {
            if !Self::update_task_guarded(&mut tx, sibling).await? {
                tx.rollback().await?;
                return Err(DomainError::ConcurrencyConflict {
                    entity: "approval_task".to_string(),
                    id: sibling.task.id.to_string(),
                });
            }
        }

        for task in &write.new_tasks {
            insert_task(&mut tx, task).await?;
        }

        if let Some(guarded) = &write.instance {
            let instance = &guarded.instance;
            // The step cache travels with the row: activation stamps live in
            // the snapshot JSON.
            let steps_json = serde_json::to_string(&instance.steps)?;
            let result = sqlx::query(
                r#"UPDATE workflow_instances SET status = ?, current_sequence = ?, on_hold = ?,
                   steps = ?, completed_at = ?, version = ?
                   WHERE id = ? AND version = ?"#,
            )
            .bind(instance.status.as_str())
            .bind(i64::from(instance.current_sequence))
            .bind(instance.on_hold)
            .bind(&steps_json)
            .bind(instance.completed_at.map(|t| t.to_rfc3339()))
            .bind(instance.version as i64)
            .bind(instance.id.to_string())
            .bind(guarded.expected_version as i64)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(DomainError::ConcurrencyConflict {
                    entity: "workflow_instance".to_string(),
                    id: instance.id.to_string(),
                });
            }
        }

        for entry in &write.history {
            insert_history_entry(&mut tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_in_progress(&self) -> DomainResult<Vec<WorkflowInstance>> {
        let rows: Vec<InstanceRow> = sqlx::query_as(
            "SELECT * FROM workflow_instances WHERE status = 'in_progress' ORDER BY started_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<WorkflowInstance>> {
        let rows: Vec<InstanceRow> = sqlx::query_as(
            r#"SELECT * FROM workflow_instances
               WHERE started_at >= ? AND started_at < ? ORDER BY started_at"#,
        )
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_by_status(&self) -> DomainResult<HashMap<InstanceStatus, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM workflow_instances GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (status_str, count) in rows {
            if let Some(status) = InstanceStatus::from_str(&status_str) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: String,
    definition_id: String,
    definition_code: String,
    entity_type: String,
    entity_id: String,
    entity_reference: String,
    initiator_id: String,
    initiator_comments: Option<String>,
    status: String,
    current_sequence: i64,
    on_hold: bool,
    allow_parallel: bool,
    require_all: bool,
    steps: String,
    started_at: String,
    completed_at: Option<String>,
    version: i64,
}

impl TryFrom<InstanceRow> for WorkflowInstance {
    type Error = DomainError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        let status = InstanceStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;
        let steps: Vec<StepSnapshot> = serde_json::from_str(&row.steps)?;

        Ok(WorkflowInstance {
            id: parse_uuid(&row.id)?,
            definition_id: parse_uuid(&row.definition_id)?,
            definition_code: row.definition_code,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            entity_reference: row.entity_reference,
            initiator_id: parse_uuid(&row.initiator_id)?,
            initiator_comments: row.initiator_comments,
            status,
            current_sequence: row.current_sequence as u32,
            on_hold: row.on_hold,
            allow_parallel: row.allow_parallel,
            require_all: row.require_all,
            steps,
            started_at: parse_datetime(&row.started_at)?,
            completed_at: parse_opt_datetime(row.completed_at.as_deref())?,
            version: row.version as u64,
        })
    }
}
