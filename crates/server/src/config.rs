//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string (`APP_DATABASE_URL` takes precedence)
//! - `OWNER_EMAIL` - Email of the owner (super admin) account
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_USER` - SMTP authentication username
//! - `SMTP_PASS` - SMTP authentication password
//! - `SMTP_FROM` - Email sender address
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 127.0.0.1)
//! - `APP_PORT` - Listen port (default: 3000)
//! - `APP_BASE_URL` - Public URL of the service (default: `http://localhost:3000`)
//! - `SMTP_PORT` - SMTP port (default: 587; 465 selects implicit TLS)
//! - `SMTP_FROM_NAME` - Display name for the sender (default: Loan Applications)
//! - `COMPANY_NAME` - Company identifier used in headers and templates (default: Blue Lender)
//! - `ABUSE_EMAIL` - Abuse-report address advertised in headers (default: `SMTP_FROM`)
//! - `EMAIL_RETRY_INTERVAL_SECS` - Failed-email sweep interval, 0 disables (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (TLS)
//! - `APP_TLS_CERT` - PEM-encoded certificate chain
//! - `APP_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bluelender_core::Email;
use secrecy::SecretString;
use thiserror::Error;

/// Well-known port for SMTP over implicit TLS.
pub const SMTPS_PORT: u16 = 465;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 300;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the service
    pub base_url: String,
    /// Owner (super admin) email, injected everywhere owner precedence applies
    pub owner_email: Email,
    /// SMTP configuration
    pub email: SmtpConfig,
    /// How often queued failed emails are re-sent (`None` disables the sweep)
    pub email_retry_interval: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// SMTP transport configuration.
///
/// Read-only at runtime. Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port
    pub port: u16,
    /// SMTP authentication username
    pub username: String,
    /// SMTP authentication password
    pub password: SecretString,
    /// Sender address (From header)
    pub from_address: Email,
    /// Sender display name
    pub from_name: String,
    /// Company identifier added to outgoing headers and templates
    pub company_name: String,
    /// Address advertised for abuse reports and unsubscribe requests
    pub abuse_address: Email,
}

impl SmtpConfig {
    /// Whether the connection uses implicit TLS (port 465) rather than STARTTLS.
    #[must_use]
    pub const fn implicit_tls(&self) -> bool {
        self.port == SMTPS_PORT
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("company_name", &self.company_name)
            .field("abuse_address", &self.abuse_address)
            .finish()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("APP_TLS_CERT");
        let key_pem = get_optional_env("APP_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "APP_TLS_*".to_string(),
                "Both APP_TLS_CERT and APP_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("APP_DATABASE_URL")?;
        let host = get_env_or_default("APP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("APP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("APP_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("APP_BASE_URL", "http://localhost:3000");
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("APP_BASE_URL".to_string(), e.to_string()))?;

        let owner_email = get_required_email("OWNER_EMAIL")?;
        let email = SmtpConfig::from_env()?;

        let retry_secs = get_env_or_default(
            "EMAIL_RETRY_INTERVAL_SECS",
            &DEFAULT_RETRY_INTERVAL_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("EMAIL_RETRY_INTERVAL_SECS".to_string(), e.to_string())
        })?;
        let email_retry_interval = (retry_secs > 0).then(|| Duration::from_secs(retry_secs));

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.2);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            owner_email,
            email,
            email_retry_interval,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        let password = get_required_env("SMTP_PASS")?;
        // Provider-issued app passwords vary widely; weak values only warn.
        if let Err(e) = validate_secret_strength(&password, "SMTP_PASS") {
            tracing::warn!("SMTP_PASS validation warning: {e}");
        }

        let from_address = get_required_email("SMTP_FROM")?;
        let abuse_address = match get_optional_env("ABUSE_EMAIL") {
            Some(value) => Email::parse(&value).map_err(|e| {
                ConfigError::InvalidEnvVar("ABUSE_EMAIL".to_string(), e.to_string())
            })?,
            None => from_address.clone(),
        };

        Ok(Self {
            host: get_required_env("SMTP_HOST")?,
            port,
            username: get_required_env("SMTP_USER")?,
            password: SecretString::from(password),
            from_address,
            from_name: get_env_or_default("SMTP_FROM_NAME", "Loan Applications"),
            company_name: get_env_or_default("COMPANY_NAME", "Blue Lender"),
            abuse_address,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable holding an email address.
fn get_required_email(key: &str) -> Result<Email, ConfigError> {
    let value = get_required_env(key)?;
    Email::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get database URL, preferring the service-specific key over generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
