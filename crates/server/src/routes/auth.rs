//! Admin login and logout.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::error::{ApiJson, AppError};
use crate::middleware::{RequireAdmin, clear_current_admin, set_current_admin};
use crate::models::AdminUserView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/logout", post(logout))
        .route("/admin/session", get(current))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /admin/login
async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = state.auth().login(&request.email, &request.password).await?;
    set_current_admin(&session, &admin).await?;

    let is_owner = state.owner_policy().is_owner(&admin.email);
    Ok(Json(json!({
        "success": true,
        "admin": AdminUserView::from(admin),
        "isOwner": is_owner,
    })))
}

/// POST /admin/logout
async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    clear_current_admin(&session).await?;
    Ok(Json(json!({ "success": true })))
}

/// The logged-in admin.
///
/// GET /admin/session
async fn current(RequireAdmin(admin): RequireAdmin, State(state): State<AppState>) -> impl IntoResponse {
    let is_owner = state.owner_policy().is_owner(&admin.email);
    Json(json!({
        "success": true,
        "admin": AdminUserView::from(admin),
        "isOwner": is_owner,
    }))
}
