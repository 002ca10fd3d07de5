//! Domain models for the intake service.

pub mod admin_user;
pub mod application;
pub mod failed_email;
pub mod recipient;
pub mod session;

pub use admin_user::{AdminUser, AdminUserView, NewAdminUser};
pub use application::{
    ApplicationPage, ApplicationRecord, ApplicationSubmission, BusinessInfo, LoanInfo,
    PersonalInfo, RequestMetadata,
};
pub use failed_email::{EmailKind, FailedEmail, NewFailedEmail};
pub use recipient::{EmailRecipient, NewRecipient, RecipientView};
pub use session::keys as session_keys;
