//! Read-only SMTP settings view.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde_json::json;

use crate::middleware::{ManageSmtp, RequirePermission};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/smtp-config", get(show))
}

/// SMTP settings without the password.
///
/// GET /admin/smtp-config
async fn show(_: RequirePermission<ManageSmtp>, State(state): State<AppState>) -> impl IntoResponse {
    let smtp = &state.config().email;
    Json(json!({
        "success": true,
        "config": {
            "host": smtp.host,
            "port": smtp.port,
            "username": smtp.username,
            "fromAddress": smtp.from_address,
            "fromName": smtp.from_name,
            "secure": smtp.implicit_tls(),
        },
    }))
}
