//! Queued notification that could not be delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bluelender_core::{ApplicationId, Email, FailedEmailId};

use crate::services::email::EmailAttachment;

/// Which notification an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailKind {
    AdminNotification,
    ApplicantConfirmation,
    StatusUpdate,
}

impl EmailKind {
    /// Wire and column representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminNotification => "admin-notification",
            Self::ApplicantConfirmation => "applicant-confirmation",
            Self::StatusUpdate => "status-update",
        }
    }
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin-notification" => Ok(Self::AdminNotification),
            "applicant-confirmation" => Ok(Self::ApplicantConfirmation),
            "status-update" => Ok(Self::StatusUpdate),
            _ => Err(format!("invalid email kind: {s}")),
        }
    }
}

/// A message waiting to be re-sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEmail {
    pub id: FailedEmailId,
    pub kind: EmailKind,
    pub application_id: Option<ApplicationId>,
    pub recipients: Vec<Email>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
    pub last_error: String,
    /// Delivery attempts made so far, including the original send.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
}

/// A message to enqueue after its first delivery failed.
#[derive(Debug, Clone)]
pub struct NewFailedEmail {
    pub kind: EmailKind,
    pub application_id: Option<ApplicationId>,
    pub recipients: Vec<Email>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
    pub last_error: String,
}
