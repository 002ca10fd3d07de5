//! Failed-email queue commands.
//!
//! Uses the server's full configuration (database and SMTP settings).

use std::sync::Arc;

use bluelender_server::config::{AppConfig, ConfigError};
use bluelender_server::db::{FailedEmailRepository, RepositoryError};
use bluelender_server::services::{
    FailedEmailRetrier, NotificationDispatcher, SmtpTransportFactory,
};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] RepositoryError),
}

/// Re-send up to `limit` queued emails once.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the queue cannot be
/// read or updated. Individual delivery failures are recorded in the queue.
pub async fn retry(limit: u32) -> Result<(), EmailsError> {
    let config = AppConfig::from_env()?;
    let pool = PgPool::connect(config.database_url.expose_secret()).await?;

    let notifier = Arc::new(NotificationDispatcher::new(
        &config.email,
        Arc::new(SmtpTransportFactory::new(config.email.clone())),
    ));
    let retrier = FailedEmailRetrier::new(notifier, Arc::new(FailedEmailRepository::new(pool)));

    let summary = retrier.run_once(limit).await?;
    tracing::info!(
        sent = summary.sent,
        failed = summary.failed,
        dropped = summary.dropped,
        "Queue retry complete"
    );
    Ok(())
}
