//! Outbound email: request types, the SMTP transport, and the retrying
//! notification dispatcher.
//!
//! Callers build a [`SendRequest`] and hand it to a [`Notifier`]. The
//! production notifier is [`NotificationDispatcher`], which validates the
//! request, stamps compliance headers, and delivers through a cached
//! [`MailTransport`] with bounded retries for transient failures.

mod dispatcher;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bluelender_core::Email;

pub use dispatcher::{NotificationDispatcher, RetryPolicy};
pub use smtp::SmtpTransportFactory;

/// Destination of a send request, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// A single address; if it is invalid the send fails.
    One(String),
    /// Several addresses; invalid entries are dropped.
    Many(Vec<String>),
}

impl From<&Email> for Recipients {
    fn from(email: &Email) -> Self {
        Self::One(email.as_str().to_owned())
    }
}

impl From<&[Email]> for Recipients {
    fn from(emails: &[Email]) -> Self {
        Self::Many(emails.iter().map(|e| e.as_str().to_owned()).collect())
    }
}

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl EmailAttachment {
    /// A PDF attachment.
    #[must_use]
    pub fn pdf(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "application/pdf".to_owned(),
            content,
        }
    }
}

/// A message to send.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub to: Recipients,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// Addresses the message was sent to after validation.
    pub accepted: Vec<Email>,
}

/// Fully prepared message handed to a transport.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub message_id: String,
    pub from_name: String,
    pub from_address: Email,
    pub to: Vec<Email>,
    pub subject: String,
    pub html: String,
    pub headers: Vec<(String, String)>,
    pub attachments: Vec<EmailAttachment>,
}

/// One failed delivery or connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    /// SMTP reply code, when the server sent one.
    pub code: Option<u16>,
    pub message: String,
}

/// Message fragments that mark a network-level failure.
const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "network",
    "timeout",
    "timed out",
    "etimedout",
    "econnreset",
    "econnrefused",
    "socket",
];

impl DeliveryError {
    #[must_use]
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether retrying may succeed.
    ///
    /// Transient: SMTP 421, 450-455, 471-475, or a network-level message.
    /// Everything else is permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        if let Some(code) = self.code
            && matches!(code, 421 | 450..=455 | 471..=475)
        {
            return true;
        }
        let message = self.message.to_lowercase();
        TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code} {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Why a send request failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("no valid recipient addresses")]
    NoValidRecipients,

    #[error("email subject is empty")]
    EmptySubject,

    #[error("email body is empty")]
    EmptyBody,

    /// The transport could not be built or failed its verify handshake.
    #[error("SMTP transport unavailable: {0}")]
    Transport(String),

    #[error("delivery failed after {attempts} attempt(s): {source}")]
    Delivery {
        attempts: u32,
        #[source]
        source: DeliveryError,
    },
}

/// Sends an [`OutgoingMessage`] over an established connection.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// Builds and verifies a [`MailTransport`].
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Build a transport and verify it with a live handshake.
    async fn connect(&self) -> Result<Arc<dyn MailTransport>, DeliveryError>;
}

/// Anything that can send a [`SendRequest`].
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message. Never panics; every failure is a `DispatchError`.
    async fn send(&self, request: SendRequest) -> Result<DeliveryReceipt, DispatchError>;
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        for code in [421, 450, 451, 452, 455, 471, 475] {
            assert!(DeliveryError::new(Some(code), "try later").is_transient(), "{code}");
        }
        for code in [250, 420, 456, 470, 476, 500, 550, 554] {
            assert!(!DeliveryError::new(Some(code), "rejected").is_transient(), "{code}");
        }
    }

    #[test]
    fn test_transient_messages() {
        assert!(DeliveryError::new(None, "Connection reset by peer").is_transient());
        assert!(DeliveryError::new(None, "connect ETIMEDOUT 10.0.0.1:587").is_transient());
        assert!(DeliveryError::new(None, "socket hang up").is_transient());
        assert!(!DeliveryError::new(None, "invalid login").is_transient());
        assert!(!DeliveryError::new(Some(535), "authentication failed").is_transient());
    }

    #[test]
    fn test_delivery_error_display() {
        assert_eq!(
            DeliveryError::new(Some(450), "mailbox busy").to_string(),
            "450 mailbox busy"
        );
        assert_eq!(DeliveryError::new(None, "timeout").to_string(), "timeout");
    }

    #[test]
    fn test_attachment_content_is_base64_in_json() {
        let attachment = EmailAttachment::pdf("application.pdf", b"%PDF-1.4".to_vec());
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["content"], "JVBERi0xLjQ=");

        let back: EmailAttachment = serde_json::from_value(json).unwrap();
        assert_eq!(back, attachment);
    }
}
