//! Admin capability model.
//!
//! Four independent booleans decide what an admin may do. The account that
//! holds all four is the owner (super admin); see [`Permissions::is_full`].

use serde::{Deserialize, Serialize};

/// One named capability that an admin endpoint can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ViewApplications,
    ManageAdmins,
    ManageSmtp,
    ManageRecipients,
}

impl Capability {
    /// Field name used in JSON payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewApplications => "viewApplications",
            Self::ManageAdmins => "manageAdmins",
            Self::ManageSmtp => "manageSmtp",
            Self::ManageRecipients => "manageRecipients",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flags carried by every admin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub view_applications: bool,
    pub manage_admins: bool,
    pub manage_smtp: bool,
    pub manage_recipients: bool,
}

impl Permissions {
    /// Every capability granted. Reserved for the owner account.
    pub const FULL: Self = Self {
        view_applications: true,
        manage_admins: true,
        manage_smtp: true,
        manage_recipients: true,
    };

    /// No capability granted.
    pub const NONE: Self = Self {
        view_applications: false,
        manage_admins: false,
        manage_smtp: false,
        manage_recipients: false,
    };

    /// Whether this set grants `capability`.
    #[must_use]
    pub const fn grants(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewApplications => self.view_applications,
            Capability::ManageAdmins => self.manage_admins,
            Capability::ManageSmtp => self.manage_smtp,
            Capability::ManageRecipients => self.manage_recipients,
        }
    }

    /// Whether all four capabilities are granted at once.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.view_applications && self.manage_admins && self.manage_smtp && self.manage_recipients
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_checks_single_flag() {
        let perms = Permissions {
            manage_recipients: true,
            ..Permissions::NONE
        };
        assert!(perms.grants(Capability::ManageRecipients));
        assert!(!perms.grants(Capability::ManageAdmins));
        assert!(!perms.grants(Capability::ViewApplications));
        assert!(!perms.is_full());
    }

    #[test]
    fn test_full() {
        assert!(Permissions::FULL.is_full());
        assert!(!Permissions::NONE.is_full());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(Permissions::FULL).unwrap();
        assert_eq!(json["viewApplications"], true);
        assert_eq!(json["manageSmtp"], true);

        let partial: Permissions =
            serde_json::from_str(r#"{"viewApplications": true}"#).unwrap();
        assert!(partial.view_applications);
        assert!(!partial.manage_admins);
    }
}
