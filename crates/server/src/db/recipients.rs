//! Notification recipient repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bluelender_core::{Email, RecipientId};

use super::{RecipientStore, RepositoryError, conflict_on_unique};
use crate::models::{EmailRecipient, NewRecipient};

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: i32,
    name: String,
    email: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecipientRow> for EmailRecipient {
    type Error = RepositoryError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: RecipientId::new(row.id),
            name: row.name,
            email,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres repository for notification recipients.
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    /// Create a new recipient repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, name, email, active, created_at, updated_at";

#[async_trait]
impl RecipientStore for RecipientRepository {
    async fn list(&self) -> Result<Vec<EmailRecipient>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {COLUMNS} FROM intake.email_recipient ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, id: RecipientId) -> Result<Option<EmailRecipient>, RepositoryError> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {COLUMNS} FROM intake.email_recipient WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<EmailRecipient>, RepositoryError> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {COLUMNS} FROM intake.email_recipient WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, recipient: NewRecipient) -> Result<EmailRecipient, RepositoryError> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            r"
            INSERT INTO intake.email_recipient (name, email, active)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "
        ))
        .bind(&recipient.name)
        .bind(recipient.email.as_str())
        .bind(recipient.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "recipient email"))?;

        row.try_into()
    }

    async fn update(&self, recipient: &EmailRecipient) -> Result<EmailRecipient, RepositoryError> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            r"
            UPDATE intake.email_recipient
            SET name = $2, email = $3, active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(recipient.id)
        .bind(&recipient.name)
        .bind(recipient.email.as_str())
        .bind(recipient.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "recipient email"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete(&self, id: RecipientId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM intake.email_recipient WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
