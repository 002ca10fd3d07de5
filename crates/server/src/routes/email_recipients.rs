//! Notification recipient management.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use bluelender_core::RecipientId;

use crate::error::{ApiJson, ApiQuery, AppError};
use crate::middleware::{ManageRecipients, RequirePermission};
use crate::services::directory::{RecipientChanges, RecipientInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/admin/email-recipients",
        get(list).post(create).put(update).delete(delete),
    )
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: i32,
}

/// GET /admin/email-recipients
async fn list(
    _: RequirePermission<ManageRecipients>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let recipients = state.recipients().list().await?;
    Ok(Json(json!({ "success": true, "recipients": recipients })))
}

/// POST /admin/email-recipients
async fn create(
    _: RequirePermission<ManageRecipients>,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RecipientInput>,
) -> Result<impl IntoResponse, AppError> {
    let recipient = state.recipients().create(input).await?;
    Ok(Json(json!({ "success": true, "recipient": recipient })))
}

/// PUT /admin/email-recipients
async fn update(
    _: RequirePermission<ManageRecipients>,
    State(state): State<AppState>,
    ApiJson(changes): ApiJson<RecipientChanges>,
) -> Result<impl IntoResponse, AppError> {
    let recipient = state.recipients().update(changes).await?;
    Ok(Json(json!({ "success": true, "recipient": recipient })))
}

/// DELETE /admin/email-recipients?id=
async fn delete(
    _: RequirePermission<ManageRecipients>,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.recipients().delete(RecipientId::new(query.id)).await?;
    Ok(Json(json!({ "success": true })))
}
