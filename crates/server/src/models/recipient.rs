//! Notification recipient domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluelender_core::{Email, RecipientId};

/// An address that receives admin notifications for new applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecipient {
    pub id: RecipientId,
    pub name: String,
    pub email: Email,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new recipient.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub name: String,
    pub email: Email,
    pub active: bool,
}

/// JSON shape returned by the recipients endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientView {
    pub id: RecipientId,
    pub name: String,
    pub email: Email,
    pub active: bool,
    /// Whether this is the owner's address.
    pub is_main_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipientView {
    /// Build the view, deriving `is_main_admin` from the owner address.
    #[must_use]
    pub fn new(recipient: EmailRecipient, owner: &Email) -> Self {
        let is_main_admin = recipient.email == *owner;
        Self {
            id: recipient.id,
            name: recipient.name,
            email: recipient.email,
            // The owner record is always treated as active.
            active: recipient.active || is_main_admin,
            is_main_admin,
            created_at: recipient.created_at,
            updated_at: recipient.updated_at,
        }
    }
}
