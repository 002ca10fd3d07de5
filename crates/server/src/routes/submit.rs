//! Public application submission endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use crate::error::{ApiJson, AppError};
use crate::models::{ApplicationSubmission, RequestMetadata};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/application/submit", post(submit))
}

/// Accept a loan application.
///
/// POST /application/submit
///
/// Responds once the record is stored and both PDFs are rendered. Emails
/// go out in the background and never affect the response.
async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(submission): ApiJson<ApplicationSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .submissions()
        .submit(submission, request_metadata(&headers))
        .await?;

    Ok(Json(json!({ "success": true, "id": receipt.id })))
}

/// Client address and user agent as seen through the proxy.
fn request_metadata(headers: &HeaderMap) -> RequestMetadata {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(String::from);

    RequestMetadata {
        ip,
        user_agent: header_str(header::USER_AGENT.as_str()).map(String::from),
    }
}
