//! Status and role enums.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a loan application.
///
/// Applications are created as `Submitted`; every later transition is made
/// by an admin through the status-update endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Draft,
    #[default]
    Submitted,
    InReview,
    Approved,
    Denied,
}

impl ApplicationStatus {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::Submitted,
        Self::InReview,
        Self::Approved,
        Self::Denied,
    ];

    /// Wire representation (`draft`, `submitted`, `in-review`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in-review",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Whether moving into this status notifies the applicant.
    #[must_use]
    pub const fn notifies_applicant(self) -> bool {
        matches!(self, Self::InReview | Self::Approved | Self::Denied)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "invalid status: {s}. Valid statuses: draft, submitted, in-review, approved, denied"
                )
            })
    }
}

/// Admin account role.
///
/// The role is descriptive; what an account may do is decided by its
/// [`Permissions`](crate::Permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AdminRole {
    Admin,
    #[default]
    SubAdmin,
}

impl AdminRole {
    /// Wire representation (`admin` or `sub-admin`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SubAdmin => "sub-admin",
        }
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "sub-admin" => Ok(Self::SubAdmin),
            _ => Err(format!("invalid admin role: {s}. Valid roles: admin, sub-admin")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_wire_names() {
        for status in ApplicationStatus::ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("pending".parse::<ApplicationStatus>().is_err());
        assert!("In-Review".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_notifying_statuses() {
        assert!(ApplicationStatus::Approved.notifies_applicant());
        assert!(ApplicationStatus::Denied.notifies_applicant());
        assert!(ApplicationStatus::InReview.notifies_applicant());
        assert!(!ApplicationStatus::Submitted.notifies_applicant());
        assert!(!ApplicationStatus::Draft.notifies_applicant());
    }

    #[test]
    fn test_admin_role_parse() {
        assert_eq!("sub-admin".parse::<AdminRole>().unwrap(), AdminRole::SubAdmin);
        assert_eq!(AdminRole::Admin.to_string(), "admin");
        assert!("super_admin".parse::<AdminRole>().is_err());
    }
}
