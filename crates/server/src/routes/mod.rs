//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                    - Liveness
//! GET  /health/ready              - Readiness (store ping)
//!
//! # Public
//! POST /application/submit        - Submit a loan application
//!
//! # Session
//! POST /admin/login               - Password login
//! POST /admin/logout              - End session
//! GET  /admin/session             - Current admin
//!
//! # Applications (viewApplications; DELETE owner only)
//! GET    /admin/applications      - List, or one by ?id=
//! PUT    /admin/applications      - Change status and notes
//! DELETE /admin/applications?id=  - Delete
//!
//! # Recipients (manageRecipients)
//! GET|POST|PUT|DELETE /admin/email-recipients
//!
//! # Admin accounts (manageAdmins)
//! GET|POST|PUT|DELETE /admin/manage-admins
//!
//! # SMTP (manageSmtp)
//! GET  /admin/smtp-config         - Settings without password
//! ```

use axum::Router;

use crate::state::AppState;

pub mod applications;
pub mod auth;
pub mod email_recipients;
pub mod health;
pub mod manage_admins;
pub mod smtp_config;
pub mod submit;

/// Every route, without middleware layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(submit::router())
        .merge(auth::router())
        .merge(applications::router())
        .merge(email_recipients::router())
        .merge(manage_admins::router())
        .merge(smtp_config::router())
}
