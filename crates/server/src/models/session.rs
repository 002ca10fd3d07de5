//! Session-related types for admin authentication.

/// Session keys for admin authentication data.
pub mod keys {
    /// Key storing the logged-in admin's database ID.
    ///
    /// Only the ID is kept; the account is re-loaded on every request so
    /// permission changes and deletions take effect immediately.
    pub const ADMIN_ID: &str = "admin_id";
}
