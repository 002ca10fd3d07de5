//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions with
//! SameSite=Strict cookies and an 8 hour inactivity expiry.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "bluelender_admin_session";

/// Session expiry time in seconds (8 hours of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 8 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// # Panics
///
/// Panics if the schema name or table name is invalid (should never happen
/// with hardcoded "intake" and "session" values).
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &AppConfig) -> SessionManagerLayer<PostgresStore> {
    // The session table is created by the intake schema migration.
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("intake")
        .expect("valid schema name")
        .with_table_name("session")
        .expect("valid table name");

    configure(SessionManagerLayer::new(store), config)
}

/// Apply cookie settings to a session layer over any store.
#[must_use]
pub fn configure<S>(layer: SessionManagerLayer<S>, config: &AppConfig) -> SessionManagerLayer<S>
where
    S: tower_sessions::SessionStore,
{
    let is_secure = config.base_url.starts_with("https://");

    layer
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
