//! Shared row helpers for the SQLite adapters: decoding and the insert
//! statements used from more than one repository.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{ApprovalTask, HistoryEntry};

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DomainError> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

pub(crate) fn parse_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>, DomainError> {
    s.map(parse_uuid).transpose()
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

pub(crate) fn parse_opt_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DomainError> {
    s.map(parse_datetime).transpose()
}

pub(crate) async fn insert_task(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    task: &ApprovalTask,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"INSERT INTO approval_tasks (id, instance_id, step_sequence, assignee_id, department_id,
           claimable, status, assigned_at, due_at, acted_at, comments, version)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(task.id.to_string())
    .bind(task.instance_id.to_string())
    .bind(task.step_sequence as i64)
    .bind(task.assignee_id.to_string())
    .bind(task.department_id.map(|id| id.to_string()))
    .bind(task.claimable)
    .bind(task.status.as_str())
    .bind(task.assigned_at.to_rfc3339())
    .bind(task.due_at.map(|t| t.to_rfc3339()))
    .bind(task.acted_at.map(|t| t.to_rfc3339()))
    .bind(&task.comments)
    .bind(task.version as i64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(crate) async fn insert_history_entry(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &HistoryEntry,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"INSERT INTO workflow_history (id, instance_id, step_sequence, task_id, actor_id,
           action, detail, recorded_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(entry.id.to_string())
    .bind(entry.instance_id.to_string())
    .bind(entry.step_sequence.map(i64::from))
    .bind(entry.task_id.map(|id| id.to_string()))
    .bind(entry.actor_id.map(|id| id.to_string()))
    .bind(entry.action.as_str())
    .bind(&entry.detail)
    .bind(entry.recorded_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
