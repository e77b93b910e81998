//! SQLite implementation of the HistoryRepository.
//!
//! History rows are only ever written inside the transactional paths of the
//! instance and task repositories, so this adapter is read-only.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HistoryAction, HistoryEntry};
use crate::domain::ports::HistoryRepository;

use super::util::{parse_datetime, parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn for_instance(&self, instance_id: Uuid) -> DomainResult<Vec<HistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT * FROM workflow_history WHERE instance_id = ? ORDER BY recorded_at, rowid",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    instance_id: String,
    step_sequence: Option<i64>,
    task_id: Option<String>,
    actor_id: Option<String>,
    action: String,
    detail: Option<String>,
    recorded_at: String,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let action = HistoryAction::from_str(&row.action)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid history action: {}", row.action)))?;

        Ok(HistoryEntry {
            id: parse_uuid(&row.id)?,
            instance_id: parse_uuid(&row.instance_id)?,
            step_sequence: row.step_sequence.map(|s| s as u32),
            task_id: parse_opt_uuid(row.task_id.as_deref())?,
            actor_id: parse_opt_uuid(row.actor_id.as_deref())?,
            action,
            detail: row.detail,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::util::insert_history_entry;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteDefinitionRepository, SqliteInstanceRepository,
    };
    use crate::domain::models::{ApproverSpec, WorkflowDefinition, WorkflowInstance, WorkflowStep};
    use crate::domain::ports::{DefinitionRepository, InstanceRepository};
    use chrono::{Duration, Utc};
    use sqlx::SqlitePool;

    async fn seed_instance(pool: &SqlitePool, entity_id: &str) -> Uuid {
        let def = WorkflowDefinition::new(format!("wf_{entity_id}"), "Workflow", "Entity");
        let step = WorkflowStep::new(def.id, 1, "Manager", ApproverSpec::Employee(Uuid::new_v4()));
        let def = def.with_step(step);
        SqliteDefinitionRepository::new(pool.clone()).create(&def).await.unwrap();
        let instance = WorkflowInstance::start(&def, entity_id, "Ref", Uuid::new_v4(), None, Utc::now());
        SqliteInstanceRepository::new(pool.clone()).create(&instance, &[], &[]).await.unwrap();
        instance.id
    }

    #[tokio::test]
    async fn test_for_instance_ordered_by_time() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteHistoryRepository::new(pool.clone());

        let instance_id = seed_instance(&pool, "1").await;
        let other_instance_id = seed_instance(&pool, "2").await;
        let base = Utc::now();
        let first = HistoryEntry::new(instance_id, HistoryAction::Started, base);
        let second = HistoryEntry::new(instance_id, HistoryAction::StepActivated, base + Duration::seconds(1))
            .with_step(1);
        let other = HistoryEntry::new(other_instance_id, HistoryAction::Started, base);

        let mut tx = pool.begin().await.unwrap();
        // Insert out of order to exercise the sort.
        insert_history_entry(&mut tx, &second).await.unwrap();
        insert_history_entry(&mut tx, &first).await.unwrap();
        insert_history_entry(&mut tx, &other).await.unwrap();
        tx.commit().await.unwrap();

        let entries = repo.for_instance(instance_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, HistoryAction::Started);
        assert_eq!(entries[1].action, HistoryAction::StepActivated);
        assert_eq!(entries[1].step_sequence, Some(1));
    }
}
