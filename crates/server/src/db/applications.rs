//! Loan application repository.
//!
//! The full record is kept as a JSONB document. Status, notes and
//! timestamps also live in their own columns; those columns are
//! authoritative and are merged back into the document on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use bluelender_core::{ApplicationId, ApplicationStatus};

use super::{ApplicationStore, RepositoryError, StatusTransition};
use crate::models::ApplicationRecord;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: String,
    status: String,
    notes: Option<String>,
    document: Json<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for ApplicationRecord {
    type Error = RepositoryError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let mut record: Self = serde_json::from_value(row.document.0).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid application {}: {e}", row.id))
        })?;

        record.id = ApplicationId::parse(&row.id)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        record.status = parse_status(&row.status)?;
        record.notes = row.notes;
        record.created_at = row.created_at;
        record.updated_at = row.updated_at;
        Ok(record)
    }
}

fn parse_status(value: &str) -> Result<ApplicationStatus, RepositoryError> {
    value.parse().map_err(RepositoryError::DataCorruption)
}

fn to_document(record: &ApplicationRecord) -> Result<Value, RepositoryError> {
    serde_json::to_value(record).map_err(|e| {
        RepositoryError::DataCorruption(format!("cannot serialise application {}: {e}", record.id))
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Postgres repository for loan applications.
#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    /// Create a new application repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for ApplicationRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn exists(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM intake.application WHERE id = $1)",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, record: &ApplicationRecord) -> Result<(), RepositoryError> {
        let document = to_document(record)?;

        // Colliding IDs overwrite: the newest submission wins.
        sqlx::query(
            r"
            INSERT INTO intake.application (id, status, notes, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                notes = EXCLUDED.notes,
                document = EXCLUDED.document,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(record.id.as_str())
        .bind(record.status.as_str())
        .bind(record.notes.as_deref())
        .bind(Json(document))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            r"
            SELECT id, status, notes, document, created_at, updated_at
            FROM intake.application
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<ApplicationRecord>, u64), RepositoryError> {
        let offset = i64::try_from(offset)
            .map_err(|_| RepositoryError::DataCorruption("page offset out of range".to_owned()))?;

        let rows = sqlx::query_as::<_, ApplicationRow>(
            r"
            SELECT id, status, notes, document, created_at, updated_at
            FROM intake.application
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM intake.application")
            .fetch_one(&self.pool)
            .await?;

        let records = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((records, u64::try_from(total).unwrap_or_default()))
    }

    async fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT status FROM intake.application WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(previous) = previous else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ApplicationRow>(
            r"
            UPDATE intake.application
            SET status = $2,
                notes = COALESCE($3, notes),
                updated_at = $4
            WHERE id = $1
            RETURNING id, status, notes, document, created_at, updated_at
            ",
        )
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(notes)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(StatusTransition {
            previous: parse_status(&previous)?,
            record: row.try_into()?,
        }))
    }

    async fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM intake.application WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
