//! Business logic services.
//!
//! # Services
//!
//! - `submission` - Application intake pipeline (ID, persist, PDFs, emails)
//! - `applications` - Admin listing, status changes, and deletion
//! - `directory` - Admin accounts and notification recipients with owner protection
//! - `auth` - Password login for admin accounts
//! - `documents` - PDF rendering of application records
//! - `email` - SMTP delivery with transport caching and retries
//! - `notifications` - Askama email templates
//! - `outbox` - Best-effort sending with a durable retry queue
//! - `recipients` - Admin notification recipient resolution

pub mod applications;
pub mod auth;
pub mod directory;
pub mod documents;
pub mod email;
pub mod notifications;
pub mod outbox;
pub mod recipients;
pub mod submission;

pub use applications::{ApplicationAdmin, ApplicationAdminError, StatusUpdate};
pub use auth::{AuthError, AuthService};
pub use directory::{AdminDirectory, DirectoryError, OwnerPolicy, RecipientDirectory};
pub use documents::{DocumentRenderer, PdfRenderer, PdfVariant, RenderError};
pub use email::{NotificationDispatcher, Notifier, SmtpTransportFactory};
pub use notifications::EmailComposer;
pub use outbox::{FailedEmailRetrier, NotificationOutcome, NotificationReport, NotificationTask, Outbox};
pub use submission::{SubmissionError, SubmissionReceipt, SubmissionService};
