//! SQLite implementation of the DelegationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ApprovalDelegation;
use crate::domain::ports::DelegationRepository;

use super::util::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteDelegationRepository {
    pool: SqlitePool,
}

impl SqliteDelegationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DelegationRepository for SqliteDelegationRepository {
    async fn create(&self, delegation: &ApprovalDelegation) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO approval_delegations (id, delegator_id, delegate_id, workflow_code,
               starts_at, ends_at, active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(delegation.id.to_string())
        .bind(delegation.delegator_id.to_string())
        .bind(delegation.delegate_id.to_string())
        .bind(&delegation.workflow_code)
        .bind(delegation.starts_at.to_rfc3339())
        .bind(delegation.ends_at.to_rfc3339())
        .bind(delegation.active)
        .bind(delegation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ApprovalDelegation>> {
        let row: Option<DelegationRow> = sqlx::query_as("SELECT * FROM approval_delegations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn cancel(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("UPDATE approval_delegations SET active = 0 WHERE id = ? AND active = 1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DelegationNotFound(id));
        }
        Ok(())
    }

    async fn active_for_delegator(
        &self,
        delegator_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ApprovalDelegation>> {
        let rows: Vec<DelegationRow> = sqlx::query_as(
            r#"SELECT * FROM approval_delegations
               WHERE delegator_id = ? AND active = 1 AND starts_at <= ? AND ends_at > ?
               ORDER BY created_at"#,
        )
        .bind(delegator_id.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn active_involving(&self, employee_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<ApprovalDelegation>> {
        let rows: Vec<DelegationRow> = sqlx::query_as(
            r#"SELECT * FROM approval_delegations
               WHERE (delegator_id = ? OR delegate_id = ?)
                 AND active = 1 AND starts_at <= ? AND ends_at > ?
               ORDER BY created_at"#,
        )
        .bind(employee_id.to_string())
        .bind(employee_id.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DelegationRow {
    id: String,
    delegator_id: String,
    delegate_id: String,
    workflow_code: Option<String>,
    starts_at: String,
    ends_at: String,
    active: bool,
    created_at: String,
}

impl TryFrom<DelegationRow> for ApprovalDelegation {
    type Error = DomainError;

    fn try_from(row: DelegationRow) -> Result<Self, Self::Error> {
        Ok(ApprovalDelegation {
            id: parse_uuid(&row.id)?,
            delegator_id: parse_uuid(&row.delegator_id)?,
            delegate_id: parse_uuid(&row.delegate_id)?,
            workflow_code: row.workflow_code,
            starts_at: parse_datetime(&row.starts_at)?,
            ends_at: parse_datetime(&row.ends_at)?,
            active: row.active,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
