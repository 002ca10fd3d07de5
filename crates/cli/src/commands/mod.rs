//! CLI command implementations.

pub mod admin;
pub mod emails;
pub mod migrate;

use secrecy::SecretString;

/// Database URL from `APP_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Option<SecretString> {
    dotenvy::dotenv().ok();
    std::env::var("APP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
