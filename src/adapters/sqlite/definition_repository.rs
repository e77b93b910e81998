//! SQLite implementation of the DefinitionRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ApproverSpec, StepType, WorkflowDefinition, WorkflowStep};
use crate::domain::ports::DefinitionRepository;

use super::util::{parse_datetime, parse_opt_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteDefinitionRepository {
    pool: SqlitePool,
}

impl SqliteDefinitionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_steps(&self, definition_id: Uuid) -> DomainResult<Vec<WorkflowStep>> {
        let rows: Vec<StepRow> = sqlx::query_as(
            "SELECT * FROM workflow_steps WHERE definition_id = ? ORDER BY sequence",
        )
        .bind(definition_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_steps(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        definition_id: Uuid,
        steps: &[WorkflowStep],
    ) -> DomainResult<()> {
        for step in steps {
            let (approver_kind, approver_value) = step.approver.encode();
            sqlx::query(
                r#"INSERT INTO workflow_steps (id, definition_id, sequence, name, step_type,
                   approver_kind, approver_value, allow_delegation, allow_rejection,
                   escalation_hours, escalation_role)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(step.id.to_string())
            .bind(definition_id.to_string())
            .bind(step.sequence as i64)
            .bind(&step.name)
            .bind(step.step_type.as_str())
            .bind(approver_kind)
            .bind(&approver_value)
            .bind(step.allow_delegation)
            .bind(step.allow_rejection)
            .bind(step.escalation_hours.map(i64::from))
            .bind(step.escalation_role.map(|id| id.to_string()))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DefinitionRepository for SqliteDefinitionRepository {
    async fn create(&self, definition: &WorkflowDefinition) -> DomainResult<()> {
        definition.validate().map_err(DomainError::ValidationFailed)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO workflow_definitions (id, code, name, entity_type, sla_hours,
               allow_parallel_approval, require_all_approvers, active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(definition.id.to_string())
        .bind(&definition.code)
        .bind(&definition.name)
        .bind(&definition.entity_type)
        .bind(definition.sla_hours.map(i64::from))
        .bind(definition.allow_parallel_approval)
        .bind(definition.require_all_approvers)
        .bind(definition.active)
        .bind(definition.created_at.to_rfc3339())
        .bind(definition.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        Self::insert_steps(&mut tx, definition.id, &definition.steps).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as("SELECT * FROM workflow_definitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut def: WorkflowDefinition = r.try_into()?;
                def.steps = self.load_steps(def.id).await?;
                Ok(Some(def))
            }
            None => Ok(None),
        }
    }

    async fn get_by_code(&self, code: &str) -> DomainResult<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as("SELECT * FROM workflow_definitions WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut def: WorkflowDefinition = r.try_into()?;
                def.steps = self.load_steps(def.id).await?;
                Ok(Some(def))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, active_only: bool) -> DomainResult<Vec<WorkflowDefinition>> {
        let query = if active_only {
            "SELECT * FROM workflow_definitions WHERE active = 1 ORDER BY code"
        } else {
            "SELECT * FROM workflow_definitions ORDER BY code"
        };
        let rows: Vec<DefinitionRow> = sqlx::query_as(query).fetch_all(&self.pool).await?;

        let mut definitions = Vec::new();
        for row in rows {
            let mut def: WorkflowDefinition = row.try_into()?;
            def.steps = self.load_steps(def.id).await?;
            definitions.push(def);
        }
        Ok(definitions)
    }

    async fn update(&self, definition: &WorkflowDefinition) -> DomainResult<()> {
        definition.validate().map_err(DomainError::ValidationFailed)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"UPDATE workflow_definitions SET code = ?, name = ?, entity_type = ?, sla_hours = ?,
               allow_parallel_approval = ?, require_all_approvers = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&definition.code)
        .bind(&definition.name)
        .bind(&definition.entity_type)
        .bind(definition.sla_hours.map(i64::from))
        .bind(definition.allow_parallel_approval)
        .bind(definition.require_all_approvers)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(definition.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DefinitionNotFound(definition.id));
        }

        // In-flight instances run on their snapshot; replacing steps only
        // affects future starts.
        sqlx::query("DELETE FROM workflow_steps WHERE definition_id = ?")
            .bind(definition.id.to_string())
            .execute(&mut *tx)
            .await?;
        Self::insert_steps(&mut tx, definition.id, &definition.steps).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE workflow_definitions SET active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(active)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DefinitionNotFound(id));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct DefinitionRow {
    id: String,
    code: String,
    name: String,
    entity_type: String,
    sla_hours: Option<i64>,
    allow_parallel_approval: bool,
    require_all_approvers: bool,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<DefinitionRow> for WorkflowDefinition {
    type Error = DomainError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        Ok(WorkflowDefinition {
            id: parse_uuid(&row.id)?,
            code: row.code,
            name: row.name,
            entity_type: row.entity_type,
            sla_hours: row.sla_hours.map(|h| h as u32),
            allow_parallel_approval: row.allow_parallel_approval,
            require_all_approvers: row.require_all_approvers,
            active: row.active,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            steps: Vec::new(), // Loaded separately
        })
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    id: String,
    definition_id: String,
    sequence: i64,
    name: String,
    step_type: String,
    approver_kind: String,
    approver_value: String,
    allow_delegation: bool,
    allow_rejection: bool,
    escalation_hours: Option<i64>,
    escalation_role: Option<String>,
}

impl TryFrom<StepRow> for WorkflowStep {
    type Error = DomainError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let step_type = StepType::from_str(&row.step_type)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid step type: {}", row.step_type)))?;
        let approver = ApproverSpec::decode(&row.approver_kind, &row.approver_value)
            .map_err(DomainError::SerializationError)?;

        Ok(WorkflowStep {
            id: parse_uuid(&row.id)?,
            definition_id: parse_uuid(&row.definition_id)?,
            sequence: row.sequence as u32,
            name: row.name,
            step_type,
            approver,
            allow_delegation: row.allow_delegation,
            allow_rejection: row.allow_rejection,
            escalation_hours: row.escalation_hours.map(|h| h as u32),
            escalation_role: parse_opt_uuid(row.escalation_role.as_deref())?,
        })
    }
}
