//! In-process test harness for the intake service.
//!
//! [`TestApp`] serves the real router over in-memory stores and an
//! in-memory session store. Requests go through `tower::ServiceExt::oneshot`,
//! so no ports or databases are involved.
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let cookie = app.login_as_owner().await;
//! let (status, body) = app.get("/admin/applications", Some(&cookie)).await;
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use bluelender_core::{AdminRole, ApplicationId, ApplicationStatus, Email, Permissions};
use bluelender_server::config::{AppConfig, SmtpConfig};
use bluelender_server::db::memory::{
    MemoryAdminStore, MemoryApplicationStore, MemoryFailedEmailStore, MemoryRecipientStore,
};
use bluelender_server::db::{ApplicationStore, RepositoryError, StatusTransition, Stores};
use bluelender_server::middleware::session;
use bluelender_server::models::ApplicationRecord;
use bluelender_server::services::directory::AdminInput;
use bluelender_server::services::email::{
    DeliveryError, DeliveryReceipt, DispatchError, Recipients, SendRequest,
};
use bluelender_server::services::{DocumentRenderer, Notifier, PdfVariant, RenderError};
use bluelender_server::state::AppState;

pub const OWNER_EMAIL: &str = "owner@bluelender.com";
pub const PASSWORD: &str = "correct-horse-battery";

/// Configuration with fixed test values. Nothing here is contacted.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://unused@localhost/unused"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_owned(),
        owner_email: Email::parse(OWNER_EMAIL).unwrap(),
        email: SmtpConfig {
            host: "smtp.bluelender.test".to_owned(),
            port: 587,
            username: "mailer".to_owned(),
            password: SecretString::from("smtp-password-not-used"),
            from_address: Email::parse("applications@bluelender.com").unwrap(),
            from_name: "Loan Applications".to_owned(),
            company_name: "Blue Lender".to_owned(),
            abuse_address: Email::parse("abuse@bluelender.com").unwrap(),
        },
        email_retry_interval: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
        tls: None,
    }
}

// =============================================================================
// Collaborator doubles
// =============================================================================

/// Notifier that accepts and records every request.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SendRequest>>,
}

impl RecordingNotifier {
    /// Wait until at least `count` messages were sent, or two seconds pass.
    pub async fn wait_for(&self, count: usize) -> Vec<SendRequest> {
        for _ in 0..200 {
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, request: SendRequest) -> Result<DeliveryReceipt, DispatchError> {
        let accepted = match &request.to {
            Recipients::One(to) => vec![Email::parse(to).map_err(|_| DispatchError::NoValidRecipients)?],
            Recipients::Many(to) => to.iter().filter_map(|e| Email::parse(e).ok()).collect(),
        };
        self.sent.lock().await.push(request);
        Ok(DeliveryReceipt {
            message_id: "<test@bluelender.com>".to_owned(),
            accepted,
        })
    }
}

/// Notifier whose SMTP server always defers delivery.
#[derive(Default)]
pub struct FailingNotifier {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _request: SendRequest) -> Result<DeliveryReceipt, DispatchError> {
        *self.calls.lock().await += 1;
        Err(DispatchError::Delivery {
            attempts: 4,
            source: DeliveryError::new(Some(451), "Requested action aborted: local error"),
        })
    }
}

/// Renderer returning a fixed PDF-like payload per variant.
#[derive(Default)]
pub struct StubRenderer;

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render(
        &self,
        _record: &ApplicationRecord,
        variant: &PdfVariant,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(match variant {
            PdfVariant::Admin(_) => b"%PDF-1.4 admin".to_vec(),
            PdfVariant::Applicant => b"%PDF-1.4 applicant".to_vec(),
        })
    }
}

/// Renderer that cannot lay out any document.
pub struct BrokenRenderer;

#[async_trait]
impl DocumentRenderer for BrokenRenderer {
    async fn render(
        &self,
        _record: &ApplicationRecord,
        _variant: &PdfVariant,
    ) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Layout("font table missing".to_owned()))
    }
}

/// Application store whose database is unreachable.
#[derive(Default)]
pub struct OfflineApplicationStore;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("connection refused".to_owned())
}

#[async_trait]
impl ApplicationStore for OfflineApplicationStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Err(offline())
    }

    async fn exists(&self, _id: &ApplicationId) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    async fn save(&self, _record: &ApplicationRecord) -> Result<(), RepositoryError> {
        Err(offline())
    }

    async fn get(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(offline())
    }

    async fn list(
        &self,
        _offset: u64,
        _limit: u32,
    ) -> Result<(Vec<ApplicationRecord>, u64), RepositoryError> {
        Err(offline())
    }

    async fn update_status(
        &self,
        _id: &ApplicationId,
        _status: ApplicationStatus,
        _notes: Option<&str>,
        _at: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>, RepositoryError> {
        Err(offline())
    }

    async fn delete(&self, _id: &ApplicationId) -> Result<bool, RepositoryError> {
        Err(offline())
    }
}

// =============================================================================
// Test application
// =============================================================================

/// The router plus handles on every in-memory collaborator.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub applications: Arc<MemoryApplicationStore>,
    pub recipients: Arc<MemoryRecipientStore>,
    pub admins: Arc<MemoryAdminStore>,
    pub failed_emails: Arc<MemoryFailedEmailStore>,
}

/// Swaps individual collaborators before building a [`TestApp`].
#[derive(Default)]
pub struct TestAppBuilder {
    notifier: Option<Arc<dyn Notifier>>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    application_store: Option<Arc<dyn ApplicationStore>>,
}

impl TestAppBuilder {
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the application store; [`TestApp::applications`] is then unused.
    #[must_use]
    pub fn application_store(mut self, store: Arc<dyn ApplicationStore>) -> Self {
        self.application_store = Some(store);
        self
    }

    #[must_use]
    pub fn build(self) -> TestApp {
        let config = test_config();
        let applications = Arc::new(MemoryApplicationStore::default());
        let recipients = Arc::new(MemoryRecipientStore::default());
        let admins = Arc::new(MemoryAdminStore::default());
        let failed_emails = Arc::new(MemoryFailedEmailStore::default());

        let stores = Stores {
            applications: self
                .application_store
                .unwrap_or_else(|| applications.clone() as Arc<dyn ApplicationStore>),
            recipients: recipients.clone(),
            admins: admins.clone(),
            failed_emails: failed_emails.clone(),
        };
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(RecordingNotifier::default()) as Arc<dyn Notifier>);
        let renderer = self.renderer.unwrap_or_else(|| Arc::new(StubRenderer) as Arc<dyn DocumentRenderer>);

        let state = AppState::new(config.clone(), stores, notifier, renderer);
        let session_layer = session::configure(SessionManagerLayer::new(MemoryStore::default()), &config);
        let router = bluelender_server::app(state.clone()).layer(session_layer);

        TestApp {
            router,
            state,
            applications,
            recipients,
            admins,
            failed_emails,
        }
    }
}

impl TestApp {
    /// Default app: recording notifier, stub renderer, empty stores.
    #[must_use]
    pub fn new() -> Self {
        TestAppBuilder::default().build()
    }

    #[must_use]
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Send one request. Returns the status and the JSON body (or `Null`).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> (StatusCode, Value) {
        let (status, _, body) = self.request_raw(method, uri, body, cookie).await;
        (status, body)
    }

    async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, set_cookie, json)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body), cookie).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, cookie).await
    }

    /// Create an account directly through the directory.
    pub async fn create_admin(&self, email: &str, permissions: Permissions) {
        self.state
            .admins()
            .create(
                AdminInput {
                    username: email.split('@').next().unwrap_or("admin").to_owned(),
                    email: email.to_owned(),
                    password: PASSWORD.to_owned(),
                    role: AdminRole::SubAdmin,
                    permissions,
                },
                None,
            )
            .await
            .unwrap();
    }

    /// Log in and return the session cookie (`name=value`).
    pub async fn login(&self, email: &str) -> String {
        let (status, cookie, body) = self
            .request_raw(
                Method::POST,
                "/admin/login",
                Some(json!({ "email": email, "password": PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        cookie.expect("login sets a session cookie")
    }

    /// Create the owner account and log in as it.
    pub async fn login_as_owner(&self) -> String {
        self.create_admin(OWNER_EMAIL, Permissions::NONE).await;
        self.login(OWNER_EMAIL).await
    }

    /// Create an account with `permissions` and log in as it.
    pub async fn login_with(&self, email: &str, permissions: Permissions) -> String {
        self.create_admin(email, permissions).await;
        self.login(email).await
    }

    /// Wait until the failed-email queue holds `count` entries, or two
    /// seconds pass.
    pub async fn wait_for_queue(&self, count: usize) -> usize {
        for _ in 0..200 {
            let queued = self.failed_emails.all().await.len();
            if queued >= count {
                return queued;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.failed_emails.all().await.len()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// The Jane Doe business loan form.
#[must_use]
pub fn jane_doe_form() -> Value {
    json!({
        "personalInfo": {
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@example.com",
            "phone": "555-0100"
        },
        "businessInfo": { "businessName": "Doe Bakery LLC", "yearsInBusiness": 4 },
        "loanInfo": { "loanType": "Business", "loanAmount": 50000, "loanPurpose": "Ovens" },
        "signature": "data:image/png;base64,iVBORw0KGgo="
    })
}
