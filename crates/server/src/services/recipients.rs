//! Notification recipient resolution.

use bluelender_core::Email;

use crate::models::EmailRecipient;

/// Build the delivery list for an admin notification.
///
/// The owner always comes first. Active recipients follow in their stored
/// order, skipping any address already on the list. Matching is exact and
/// case-sensitive.
#[must_use]
pub fn resolve(recipients: &[EmailRecipient], owner: &Email) -> Vec<Email> {
    let mut resolved = vec![owner.clone()];
    for recipient in recipients.iter().filter(|r| r.active) {
        if !resolved.contains(&recipient.email) {
            resolved.push(recipient.email.clone());
        }
    }
    resolved
}
