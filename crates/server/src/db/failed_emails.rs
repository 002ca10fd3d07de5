//! Repository for notifications that failed delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bluelender_core::{ApplicationId, Email, FailedEmailId};

use super::{FailedEmailStore, RepositoryError};
use crate::models::{FailedEmail, NewFailedEmail};
use crate::services::email::EmailAttachment;

#[derive(Debug, sqlx::FromRow)]
struct FailedEmailRow {
    id: i32,
    kind: String,
    application_id: Option<String>,
    recipients: Vec<String>,
    subject: String,
    html: String,
    attachments: Json<Vec<EmailAttachment>>,
    last_error: String,
    attempts: i32,
    created_at: DateTime<Utc>,
    last_attempt_at: DateTime<Utc>,
}

impl TryFrom<FailedEmailRow> for FailedEmail {
    type Error = RepositoryError;

    fn try_from(row: FailedEmailRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse().map_err(RepositoryError::DataCorruption)?;
        let application_id = row
            .application_id
            .as_deref()
            .map(ApplicationId::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let recipients = row
            .recipients
            .iter()
            .map(|r| Email::parse(r))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid queued recipient: {e}"))
            })?;

        Ok(Self {
            id: FailedEmailId::new(row.id),
            kind,
            application_id,
            recipients,
            subject: row.subject,
            html: row.html,
            attachments: row.attachments.0,
            last_error: row.last_error,
            attempts: u32::try_from(row.attempts).unwrap_or_default(),
            created_at: row.created_at,
            last_attempt_at: row.last_attempt_at,
        })
    }
}

const COLUMNS: &str = "id, kind, application_id, recipients, subject, html, attachments, \
                       last_error, attempts, created_at, last_attempt_at";

/// Postgres-backed failed-email queue.
#[derive(Clone)]
pub struct FailedEmailRepository {
    pool: PgPool,
}

impl FailedEmailRepository {
    /// Create a new failed-email repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FailedEmailStore for FailedEmailRepository {
    async fn enqueue(&self, email: NewFailedEmail) -> Result<FailedEmail, RepositoryError> {
        let recipients: Vec<&str> = email.recipients.iter().map(Email::as_str).collect();

        let row = sqlx::query_as::<_, FailedEmailRow>(&format!(
            r"
            INSERT INTO intake.failed_email
                (kind, application_id, recipients, subject, html, attachments, last_error, attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            RETURNING {COLUMNS}
            "
        ))
        .bind(email.kind.as_str())
        .bind(email.application_id.as_ref().map(ApplicationId::as_str))
        .bind(&recipients)
        .bind(&email.subject)
        .bind(&email.html)
        .bind(Json(&email.attachments))
        .bind(&email.last_error)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn pending(&self, limit: u32) -> Result<Vec<FailedEmail>, RepositoryError> {
        let rows = sqlx::query_as::<_, FailedEmailRow>(&format!(
            "SELECT {COLUMNS} FROM intake.failed_email ORDER BY created_at, id LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn record_failure(
        &self,
        id: FailedEmailId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE intake.failed_email
            SET attempts = attempts + 1, last_error = $2, last_attempt_at = $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn remove(&self, id: FailedEmailId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM intake.failed_email WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
