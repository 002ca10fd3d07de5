//! Admin application endpoints.

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use bluelender_core::{ApplicationId, ApplicationStatus};

use crate::error::{ApiJson, ApiQuery, AppError};
use crate::middleware::{RequireOwner, RequirePermission, ViewApplications};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/admin/applications",
        get(list_or_get).put(update_status).delete(delete),
    )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    id: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    id: String,
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: String,
}

fn parse_id(raw: &str) -> Result<ApplicationId, AppError> {
    ApplicationId::parse(raw.trim()).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// One application by `?id=`, otherwise a page of applications.
///
/// GET /admin/applications
async fn list_or_get(
    _: RequirePermission<ViewApplications>,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let applications = state.applications();

    if let Some(raw) = query.id.as_deref() {
        let application = applications.get(&parse_id(raw)?).await?;
        return Ok(Json(json!({ "success": true, "application": application })));
    }

    let page = applications.list(query.page, query.limit).await?;
    Ok(Json(json!({
        "success": true,
        "applications": page.applications,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": page.total,
            "totalPages": page.total_pages,
        },
    })))
}

/// Change status and notes.
///
/// PUT /admin/applications
async fn update_status(
    RequirePermission { admin, .. }: RequirePermission<ViewApplications>,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&body.id)?;
    let status: ApplicationStatus = body.status.parse().map_err(AppError::BadRequest)?;

    let update = state
        .applications()
        .update_status(&id, status, body.notes.as_deref())
        .await?;

    tracing::info!(admin_id = %admin.id, application_id = %id, status = %status, "Status changed by admin");
    Ok(Json(json!({ "success": true, "application": update.record })))
}

/// Delete an application. Owner only.
///
/// DELETE /admin/applications?id=
async fn delete(
    RequireOwner(_): RequireOwner,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&query.id)?;
    state.applications().delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
