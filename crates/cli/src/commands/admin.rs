//! Admin account commands.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `APP_DATABASE_URL`) - `PostgreSQL` connection string
//! - `OWNER_EMAIL` - Owner account address; owner protection applies to it

use std::sync::Arc;

use bluelender_core::{AdminRole, Email, Permissions};
use bluelender_server::db::AdminUserRepository;
use bluelender_server::services::directory::AdminInput;
use bluelender_server::services::{AdminDirectory, DirectoryError, OwnerPolicy};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid OWNER_EMAIL: {0}")]
    InvalidOwnerEmail(String),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: admin, sub-admin")]
    InvalidRole(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

async fn directory() -> Result<AdminDirectory, AdminError> {
    let database_url =
        super::database_url().ok_or(AdminError::MissingEnvVar("DATABASE_URL"))?;
    let owner = std::env::var("OWNER_EMAIL").map_err(|_| AdminError::MissingEnvVar("OWNER_EMAIL"))?;
    let owner = Email::parse(&owner).map_err(|e| AdminError::InvalidOwnerEmail(e.to_string()))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    Ok(AdminDirectory::new(
        Arc::new(AdminUserRepository::new(pool)),
        OwnerPolicy::new(owner),
    ))
}

/// Create an admin account.
///
/// The owner address always receives every permission and the `admin` role.
///
/// # Errors
///
/// Returns an error for an invalid role, rejected input, a duplicate
/// address, or a database failure.
pub async fn create(
    username: &str,
    email: &str,
    password: &str,
    role: &str,
    permissions: Permissions,
) -> Result<(), AdminError> {
    let role: AdminRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    let admin = directory()
        .await?
        .create(
            AdminInput {
                username: username.to_owned(),
                email: email.to_owned(),
                password: password.to_owned(),
                role,
                permissions,
            },
            None,
        )
        .await?;

    tracing::info!(
        "Admin account created. ID: {}, Email: {}, Role: {}",
        admin.id,
        admin.email,
        admin.role
    );
    Ok(())
}

/// Log every admin account.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub async fn list() -> Result<(), AdminError> {
    for admin in directory().await?.list().await? {
        tracing::info!(
            id = %admin.id,
            email = %admin.email,
            username = %admin.username,
            role = %admin.role,
            view_applications = admin.permissions.view_applications,
            manage_admins = admin.permissions.manage_admins,
            manage_smtp = admin.permissions.manage_smtp,
            manage_recipients = admin.permissions.manage_recipients,
            "admin"
        );
    }
    Ok(())
}

/// Delete non-owner accounts holding every permission.
///
/// # Errors
///
/// Returns an error if the database cannot be read or updated.
pub async fn cleanup() -> Result<(), AdminError> {
    let removed = directory().await?.enforce_single_super_admin().await?;
    tracing::info!(removed, "Super admin clean-up complete");
    Ok(())
}
