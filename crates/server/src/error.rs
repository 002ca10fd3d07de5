//! Unified error handling for the HTTP layer.
//!
//! Every error response has the body `{"success": false, "error": "..."}`.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{ApplicationAdminError, AuthError, DirectoryError, SubmissionError};

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// The submission pipeline failed after validation. The message is
    /// returned to the client.
    #[error("{0}")]
    Submission(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Login failed.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate resource.
    #[error("{0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Submission(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        error_response(self.status(), &message)
    }
}

/// `{"success": false, "error": message}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

impl From<SubmissionError> for AppError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Invalid(message) => Self::BadRequest(message),
            other => Self::Submission(format!("Failed to submit application: {other}")),
        }
    }
}

impl From<ApplicationAdminError> for AppError {
    fn from(e: ApplicationAdminError) -> Self {
        match e {
            ApplicationAdminError::NotFound => Self::NotFound(e.to_string()),
            ApplicationAdminError::Invalid(message) => Self::BadRequest(message),
            ApplicationAdminError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Invalid(message) | DirectoryError::OwnerProtected(message) => {
                Self::BadRequest(message)
            }
            DirectoryError::NotFound(_) => Self::NotFound(e.to_string()),
            DirectoryError::Conflict(message) => Self::Conflict(message),
            DirectoryError::Repository(e) => Self::Database(e),
            DirectoryError::PasswordHash => Self::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => Self::Unauthorized(e.to_string()),
            AuthError::WeakPassword(message) => Self::BadRequest(message),
            AuthError::PasswordHash => Self::Internal(e.to_string()),
            AuthError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session error: {e}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// JSON body extractor whose rejection uses the standard error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection uses the standard error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Set the Sentry user context from an admin user ID.
pub fn set_sentry_user(admin_user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::directory::DirectoryError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(status_of(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::Submission("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_mapping() {
        let owner = AppError::from(DirectoryError::OwnerProtected("no".into()));
        assert!(matches!(owner, AppError::BadRequest(_)));

        let dup = AppError::from(DirectoryError::Conflict("taken".into()));
        assert!(matches!(dup, AppError::Conflict(_)));

        let invalid = AppError::from(SubmissionError::Invalid("First name is required".into()));
        assert!(matches!(invalid, AppError::BadRequest(m) if m == "First name is required"));

        let failed = AppError::from(SubmissionError::Persistence(RepositoryError::Unavailable(
            "db down".into(),
        )));
        assert!(matches!(&failed, AppError::Submission(m) if m.contains("db down")));
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::Conflict("ops@bluelender.com is already in use".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "ops@bluelender.com is already in use");
    }
}
