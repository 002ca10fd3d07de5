//! Admin account domain types.
//!
//! [`AdminUser`] carries the password hash and is never serialised.
//! Handlers return [`AdminUserView`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluelender_core::{AdminRole, AdminUserId, Email, Permissions};

/// An admin account (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser {
    /// Unique admin user ID.
    pub id: AdminUserId,
    /// Login name shown in the dashboard.
    pub username: String,
    /// Email address, unique across accounts.
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Descriptive role.
    pub role: AdminRole,
    /// Capability flags.
    pub permissions: Permissions,
    /// ID of the admin who created this account.
    pub added_by: Option<AdminUserId>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new admin account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub username: String,
    pub email: Email,
    pub password_hash: String,
    pub role: AdminRole,
    pub permissions: Permissions,
    pub added_by: Option<AdminUserId>,
}

/// Admin account as returned by the API. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: AdminUserId,
    pub username: String,
    pub email: Email,
    pub role: AdminRole,
    pub permissions: Permissions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by: Option<AdminUserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminUserView {
    fn from(admin: AdminUser) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            email: admin.email,
            role: admin.role,
            permissions: admin.permissions,
            added_by: admin.added_by,
            created_at: admin.created_at,
            updated_at: admin.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_view_has_no_password() {
        let now = Utc::now();
        let admin = AdminUser {
            id: AdminUserId::new(1),
            username: "reviewer".to_string(),
            email: Email::parse("reviewer@bluelender.com").unwrap(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            role: AdminRole::SubAdmin,
            permissions: Permissions {
                view_applications: true,
                ..Permissions::NONE
            },
            added_by: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(AdminUserView::from(admin)).unwrap();
        assert_eq!(json["role"], "sub-admin");
        assert_eq!(json["permissions"]["viewApplications"], true);
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
