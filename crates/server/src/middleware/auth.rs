//! Permission gate extractors.
//!
//! The session holds only the admin ID. Every guarded request re-reads the
//! account from the admin store, so permission changes and deletions take
//! effect immediately.
//!
//! ```rust,ignore
//! async fn list(
//!     RequirePermission { admin, .. }: RequirePermission<ManageRecipients>,
//! ) -> impl IntoResponse { /* ... */ }
//! ```

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use bluelender_core::{AdminUserId, Capability};

use crate::db::RepositoryError;
use crate::error::{error_response, set_sentry_user};
use crate::models::{AdminUser, session_keys};
use crate::state::AppState;

/// A capability an endpoint can require, named at the type level.
pub trait CapabilityMarker: Send + Sync {
    const CAPABILITY: Capability;
}

macro_rules! capability_marker {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl CapabilityMarker for $name {
            const CAPABILITY: Capability = Capability::$name;
        }
    };
}

capability_marker!(ViewApplications);
capability_marker!(ManageAdmins);
capability_marker!(ManageSmtp);
capability_marker!(ManageRecipients);

/// Why a guarded request was refused.
#[derive(Debug)]
pub enum PermissionRejection {
    /// No session, or the session's admin no longer exists.
    NotAuthenticated,
    /// Authenticated but lacking the capability.
    MissingPermission(Capability),
    /// The action is reserved for the owner.
    NotOwner,
    /// The admin store could not be read.
    Store(RepositoryError),
}

impl IntoResponse for PermissionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => {
                error_response(StatusCode::FORBIDDEN, "Authentication required")
            }
            Self::MissingPermission(capability) => error_response(
                StatusCode::FORBIDDEN,
                &format!("Permission denied: {capability} permission required"),
            ),
            Self::NotOwner => error_response(
                StatusCode::FORBIDDEN,
                "Only the main admin can perform this action",
            ),
            Self::Store(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(error = %e, sentry_event_id = %event_id, "Failed to load admin for session");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// Any authenticated admin.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AdminUser);

/// An authenticated admin holding capability `C`. The owner holds every
/// capability.
#[derive(Debug, Clone)]
pub struct RequirePermission<C> {
    pub admin: AdminUser,
    _capability: PhantomData<C>,
}

/// The authenticated owner.
#[derive(Debug, Clone)]
pub struct RequireOwner(pub AdminUser);

/// Resolve the session's admin from the store.
async fn current_admin(parts: &Parts, state: &AppState) -> Result<AdminUser, PermissionRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(PermissionRejection::NotAuthenticated)?;

    let admin_id: AdminUserId = session
        .get(session_keys::ADMIN_ID)
        .await
        .ok()
        .flatten()
        .ok_or(PermissionRejection::NotAuthenticated)?;

    let admin = state
        .stores()
        .admins
        .get(admin_id)
        .await
        .map_err(PermissionRejection::Store)?
        .ok_or(PermissionRejection::NotAuthenticated)?;

    set_sentry_user(admin.id.as_i32(), Some(admin.email.as_str()));
    Ok(admin)
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = PermissionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_admin(parts, state).await.map(Self)
    }
}

impl<C: CapabilityMarker> FromRequestParts<AppState> for RequirePermission<C> {
    type Rejection = PermissionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts, state).await?;
        let is_owner = state.owner_policy().is_owner(&admin.email);

        if !is_owner && !admin.permissions.grants(C::CAPABILITY) {
            tracing::warn!(
                admin_id = %admin.id,
                capability = %C::CAPABILITY,
                path = %parts.uri.path(),
                "Permission denied"
            );
            return Err(PermissionRejection::MissingPermission(C::CAPABILITY));
        }

        Ok(Self {
            admin,
            _capability: PhantomData,
        })
    }
}

impl FromRequestParts<AppState> for RequireOwner {
    type Rejection = PermissionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts, state).await?;
        if !state.owner_policy().is_owner(&admin.email) {
            tracing::warn!(admin_id = %admin.id, path = %parts.uri.path(), "Owner-only action refused");
            return Err(PermissionRejection::NotOwner);
        }
        Ok(Self(admin))
    }
}

/// Start an authenticated session for `admin`.
///
/// The session ID is cycled to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &AdminUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::ADMIN_ID, admin.id).await
}

/// End the current session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
