//! Admin user repository for database operations.
//!
//! Permissions are stored as one JSONB object using the same camelCase
//! field names as the API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use bluelender_core::{AdminRole, AdminUserId, Email, Permissions};

use super::{AdminStore, RepositoryError, conflict_on_unique};
use crate::models::{AdminUser, NewAdminUser};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` admin user queries.
#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    permissions: Json<Permissions>,
    added_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AdminUserRow> for AdminUser {
    type Error = RepositoryError;

    fn try_from(row: AdminUserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role: AdminRole = row.role.parse().map_err(RepositoryError::DataCorruption)?;
        Ok(Self {
            id: AdminUserId::new(row.id),
            username: row.username,
            email,
            password_hash: row.password_hash,
            role,
            permissions: row.permissions.0,
            added_by: row.added_by.map(AdminUserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str =
    "id, username, email, password_hash, role, permissions, added_by, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Postgres repository for admin accounts.
#[derive(Clone)]
pub struct AdminUserRepository {
    pool: PgPool,
}

impl AdminUserRepository {
    /// Create a new admin user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminStore for AdminUserRepository {
    async fn list(&self) -> Result<Vec<AdminUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {COLUMNS} FROM intake.admin_user ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {COLUMNS} FROM intake.admin_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            "SELECT {COLUMNS} FROM intake.admin_user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, admin: NewAdminUser) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            r"
            INSERT INTO intake.admin_user (username, email, password_hash, role, permissions, added_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "
        ))
        .bind(&admin.username)
        .bind(admin.email.as_str())
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .bind(Json(admin.permissions))
        .bind(admin.added_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "admin email"))?;

        row.try_into()
    }

    async fn update(&self, admin: &AdminUser) -> Result<AdminUser, RepositoryError> {
        let row = sqlx::query_as::<_, AdminUserRow>(&format!(
            r"
            UPDATE intake.admin_user
            SET username = $2, email = $3, password_hash = $4, role = $5,
                permissions = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "
        ))
        .bind(admin.id)
        .bind(&admin.username)
        .bind(admin.email.as_str())
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .bind(Json(admin.permissions))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "admin email"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete(&self, id: AdminUserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM intake.admin_user WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
