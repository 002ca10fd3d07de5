//! HTTP middleware and extractors.
//!
//! - `auth` - Permission gate extractors resolving the session's admin
//! - `session` - `PostgreSQL`-backed tower-sessions layer

pub mod auth;
pub mod session;

pub use auth::{
    ManageAdmins, ManageRecipients, ManageSmtp, PermissionRejection, RequireAdmin, RequireOwner,
    RequirePermission, ViewApplications, clear_current_admin, set_current_admin,
};
pub use session::create_session_layer;
