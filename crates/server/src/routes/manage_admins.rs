//! Admin account management.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use bluelender_core::AdminUserId;

use crate::error::{ApiJson, ApiQuery, AppError};
use crate::middleware::{ManageAdmins, RequirePermission};
use crate::services::directory::{AdminChanges, AdminInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/admin/manage-admins",
        get(list).post(create).put(update).delete(delete),
    )
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: i32,
}

/// List accounts without password hashes.
///
/// GET /admin/manage-admins
async fn list(
    _: RequirePermission<ManageAdmins>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let admins = state.admins().list().await?;
    Ok(Json(json!({ "success": true, "admins": admins })))
}

/// POST /admin/manage-admins
async fn create(
    RequirePermission { admin, .. }: RequirePermission<ManageAdmins>,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AdminInput>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.admins().create(input, Some(admin.id)).await?;
    tracing::info!(admin_id = %admin.id, created_id = %created.id, "Admin account created");
    Ok(Json(json!({ "success": true, "admin": created })))
}

/// PUT /admin/manage-admins
async fn update(
    _: RequirePermission<ManageAdmins>,
    State(state): State<AppState>,
    ApiJson(changes): ApiJson<AdminChanges>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.admins().update(changes).await?;
    Ok(Json(json!({ "success": true, "admin": updated })))
}

/// DELETE /admin/manage-admins?id=
async fn delete(
    RequirePermission { admin, .. }: RequirePermission<ManageAdmins>,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = AdminUserId::new(query.id);
    state.admins().delete(id).await?;
    tracing::info!(admin_id = %admin.id, deleted_id = %id, "Admin account deleted");
    Ok(Json(json!({ "success": true })))
}
