//! Persistence for the intake service.
//!
//! # Database schema: `intake`
//!
//! ## Tables
//!
//! - `application` - Loan applications (JSONB document plus status columns)
//! - `email_recipient` - Notification recipients
//! - `admin_user` - Admin accounts (argon2 hashes, JSONB permissions)
//! - `failed_email` - Notifications waiting to be re-sent
//! - `session` - tower-sessions store
//!
//! # Stores
//!
//! Handlers and services talk to the store traits below, never to a pool.
//! The Postgres repositories implement them for production; the
//! [`memory`] module implements them for tests and local experiments.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bluelender-cli -- migrate
//! ```

pub mod admin_users;
pub mod applications;
pub mod failed_emails;
pub mod memory;
pub mod recipients;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use bluelender_core::{
    AdminUserId, ApplicationId, ApplicationStatus, Email, FailedEmailId, RecipientId,
};

pub use admin_users::AdminUserRepository;
pub use applications::ApplicationRepository;
pub use failed_emails::FailedEmailRepository;
pub use recipients::RecipientRepository;

use crate::models::{
    AdminUser, ApplicationRecord, EmailRecipient, FailedEmail, NewAdminUser, NewFailedEmail,
    NewRecipient,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Storage backend other than Postgres failed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Result of a status update: the status before it and the stored record after it.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub previous: ApplicationStatus,
    pub record: ApplicationRecord,
}

/// Loan application storage.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Whether a record with this ID already exists.
    async fn exists(&self, id: &ApplicationId) -> Result<bool, RepositoryError>;

    /// Write a record, replacing any record with the same ID.
    async fn save(&self, record: &ApplicationRecord) -> Result<(), RepositoryError>;

    async fn get(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;

    /// One page of records, newest first, plus the total count.
    async fn list(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<ApplicationRecord>, u64), RepositoryError>;

    /// Set status (and notes, when given). Returns `None` if the ID is unknown.
    async fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>, RepositoryError>;

    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError>;
}

/// Notification recipient storage.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// All recipients in creation order.
    async fn list(&self) -> Result<Vec<EmailRecipient>, RepositoryError>;

    async fn get(&self, id: RecipientId) -> Result<Option<EmailRecipient>, RepositoryError>;

    async fn find_by_email(&self, email: &Email)
    -> Result<Option<EmailRecipient>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already taken.
    async fn insert(&self, recipient: NewRecipient) -> Result<EmailRecipient, RepositoryError>;

    /// Overwrite name, email and active flag.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ID is unknown.
    async fn update(&self, recipient: &EmailRecipient) -> Result<EmailRecipient, RepositoryError>;

    async fn delete(&self, id: RecipientId) -> Result<bool, RepositoryError>;
}

/// Admin account storage.
#[async_trait]
pub trait AdminStore: Send + Sync {
    /// All accounts in creation order.
    async fn list(&self) -> Result<Vec<AdminUser>, RepositoryError>;

    async fn get(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<AdminUser>, RepositoryError>;

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already taken.
    async fn insert(&self, admin: NewAdminUser) -> Result<AdminUser, RepositoryError>;

    /// Overwrite every mutable field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ID is unknown.
    async fn update(&self, admin: &AdminUser) -> Result<AdminUser, RepositoryError>;

    async fn delete(&self, id: AdminUserId) -> Result<bool, RepositoryError>;
}

/// Durable queue of undelivered notifications.
#[async_trait]
pub trait FailedEmailStore: Send + Sync {
    async fn enqueue(&self, email: NewFailedEmail) -> Result<FailedEmail, RepositoryError>;

    /// Oldest entries first.
    async fn pending(&self, limit: u32) -> Result<Vec<FailedEmail>, RepositoryError>;

    /// Count another failed attempt.
    async fn record_failure(
        &self,
        id: FailedEmailId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn remove(&self, id: FailedEmailId) -> Result<(), RepositoryError>;
}

/// All stores the service needs, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub applications: Arc<dyn ApplicationStore>,
    pub recipients: Arc<dyn RecipientStore>,
    pub admins: Arc<dyn AdminStore>,
    pub failed_emails: Arc<dyn FailedEmailStore>,
}

impl Stores {
    /// Postgres-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            applications: Arc::new(ApplicationRepository::new(pool.clone())),
            recipients: Arc::new(RecipientRepository::new(pool.clone())),
            admins: Arc::new(AdminUserRepository::new(pool.clone())),
            failed_emails: Arc::new(FailedEmailRepository::new(pool.clone())),
        }
    }

    /// Empty in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            applications: Arc::new(memory::MemoryApplicationStore::default()),
            recipients: Arc::new(memory::MemoryRecipientStore::default()),
            admins: Arc::new(memory::MemoryAdminStore::default()),
            failed_emails: Arc::new(memory::MemoryFailedEmailStore::default()),
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
