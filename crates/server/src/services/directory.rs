//! Admin account and notification recipient directories.
//!
//! Both directories share one [`OwnerPolicy`] and one uniqueness check:
//!
//! - The owner's records cannot be deleted.
//! - The owner recipient is always active and keeps its address.
//! - The owner admin always holds every permission with role `admin`, and
//!   cannot be modified through the API.
//! - No other admin may hold every permission at once.
//! - Email addresses are unique within each directory.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use bluelender_core::{AdminRole, AdminUserId, Email, Permissions, RecipientId};

use super::auth::{AuthError, hash_password, validate_password};
use crate::db::{AdminStore, RecipientStore, RepositoryError};
use crate::models::{AdminUser, AdminUserView, NewAdminUser, NewRecipient, RecipientView};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{0}")]
    Invalid(String),

    /// The request would modify or remove an owner record.
    #[error("{0}")]
    OwnerProtected(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error("password hashing error")]
    PasswordHash,
}

impl From<RepositoryError> for DirectoryError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Repository(other),
        }
    }
}

impl From<AuthError> for DirectoryError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::WeakPassword(message) => Self::Invalid(message),
            AuthError::Repository(e) => e.into(),
            AuthError::InvalidCredentials | AuthError::PasswordHash => Self::PasswordHash,
        }
    }
}

/// Protection rules for the configured owner.
#[derive(Debug, Clone)]
pub struct OwnerPolicy {
    owner: Email,
}

impl OwnerPolicy {
    #[must_use]
    pub const fn new(owner: Email) -> Self {
        Self { owner }
    }

    #[must_use]
    pub const fn owner(&self) -> &Email {
        &self.owner
    }

    #[must_use]
    pub fn is_owner(&self, email: &Email) -> bool {
        *email == self.owner
    }

    /// Reject deleting the owner's record.
    ///
    /// # Errors
    ///
    /// Returns `OwnerProtected` if `email` is the owner.
    pub fn guard_delete(&self, email: &Email, what: &str) -> Result<(), DirectoryError> {
        if self.is_owner(email) {
            return Err(DirectoryError::OwnerProtected(format!(
                "Cannot delete the main admin {what}"
            )));
        }
        Ok(())
    }

    /// Role and permissions an admin account actually receives.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` if a non-owner account asks for every permission.
    pub fn admin_grants(
        &self,
        email: &Email,
        role: AdminRole,
        permissions: Permissions,
    ) -> Result<(AdminRole, Permissions), DirectoryError> {
        if self.is_owner(email) {
            return Ok((AdminRole::Admin, Permissions::FULL));
        }
        if permissions.is_full() {
            return Err(DirectoryError::Invalid(
                "Only the main admin may hold every permission".to_owned(),
            ));
        }
        Ok((role, permissions))
    }

    /// Owner recipients are always active.
    #[must_use]
    pub fn recipient_active(&self, email: &Email, requested: bool) -> bool {
        requested || self.is_owner(email)
    }
}

/// Fail with `Conflict` when `email` already belongs to a record other than
/// `current`.
fn ensure_unique<Id: PartialEq>(
    email: &Email,
    holder: Option<Id>,
    current: Option<Id>,
) -> Result<(), DirectoryError> {
    match holder {
        Some(holder) if Some(&holder) != current.as_ref() => Err(DirectoryError::Conflict(
            format!("{email} is already in use"),
        )),
        _ => Ok(()),
    }
}

fn parse_email(input: &str) -> Result<Email, DirectoryError> {
    Email::parse(input.trim())
        .map_err(|e| DirectoryError::Invalid(format!("Invalid email address: {e}")))
}

fn required(value: &str, field: &str) -> Result<String, DirectoryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DirectoryError::Invalid(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

const fn default_true() -> bool {
    true
}

// =============================================================================
// Recipients
// =============================================================================

/// Body of a recipient create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInput {
    pub name: String,
    pub email: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Body of a recipient update request. Absent fields are unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientChanges {
    pub id: RecipientId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

/// Notification recipients.
#[derive(Clone)]
pub struct RecipientDirectory {
    store: Arc<dyn RecipientStore>,
    policy: OwnerPolicy,
}

impl RecipientDirectory {
    #[must_use]
    pub fn new(store: Arc<dyn RecipientStore>, policy: OwnerPolicy) -> Self {
        Self { store, policy }
    }

    /// # Errors
    ///
    /// Returns `Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<RecipientView>, DirectoryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(|r| RecipientView::new(r, self.policy.owner()))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `Invalid` for a missing name or bad address and `Conflict`
    /// if the address is taken.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: RecipientInput) -> Result<RecipientView, DirectoryError> {
        let name = required(&input.name, "Name")?;
        let email = parse_email(&input.email)?;
        ensure_unique(
            &email,
            self.store.find_by_email(&email).await?.map(|r| r.id),
            None,
        )?;

        let active = self.policy.recipient_active(&email, input.active);
        let created = self
            .store
            .insert(NewRecipient {
                name,
                email,
                active,
            })
            .await?;

        tracing::info!(recipient_id = %created.id, "Email recipient added");
        Ok(RecipientView::new(created, self.policy.owner()))
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `Invalid`, `Conflict`, or `OwnerProtected` when
    /// the change would deactivate or re-address the owner record.
    #[tracing::instrument(skip(self, changes), fields(recipient_id = %changes.id))]
    pub async fn update(&self, changes: RecipientChanges) -> Result<RecipientView, DirectoryError> {
        let mut recipient = self
            .store
            .get(changes.id)
            .await?
            .ok_or(DirectoryError::NotFound("Recipient"))?;
        let is_owner = self.policy.is_owner(&recipient.email);

        if let Some(name) = changes.name {
            recipient.name = required(&name, "Name")?;
        }

        if let Some(email) = changes.email {
            let email = parse_email(&email)?;
            if email != recipient.email {
                if is_owner {
                    return Err(DirectoryError::OwnerProtected(
                        "Cannot change the main admin recipient's email".to_owned(),
                    ));
                }
                ensure_unique(
                    &email,
                    self.store.find_by_email(&email).await?.map(|r| r.id),
                    Some(recipient.id),
                )?;
                recipient.email = email;
            }
        }

        if let Some(active) = changes.active {
            if is_owner && !active {
                return Err(DirectoryError::OwnerProtected(
                    "Cannot deactivate the main admin recipient".to_owned(),
                ));
            }
            recipient.active = self.policy.recipient_active(&recipient.email, active);
        }

        recipient.updated_at = Utc::now();
        let updated = self.store.update(&recipient).await?;
        Ok(RecipientView::new(updated, self.policy.owner()))
    }

    /// # Errors
    ///
    /// Returns `NotFound`, or `OwnerProtected` for the owner record.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: RecipientId) -> Result<(), DirectoryError> {
        let recipient = self
            .store
            .get(id)
            .await?
            .ok_or(DirectoryError::NotFound("Recipient"))?;
        self.policy.guard_delete(&recipient.email, "recipient")?;

        if !self.store.delete(id).await? {
            return Err(DirectoryError::NotFound("Recipient"));
        }
        tracing::info!("Email recipient deleted");
        Ok(())
    }
}

// =============================================================================
// Admins
// =============================================================================

/// Body of an admin create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: AdminRole,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Body of an admin update request. Absent fields are unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminChanges {
    pub id: AdminUserId,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<AdminRole>,
    pub permissions: Option<Permissions>,
}

/// Admin accounts.
#[derive(Clone)]
pub struct AdminDirectory {
    store: Arc<dyn AdminStore>,
    policy: OwnerPolicy,
}

impl AdminDirectory {
    #[must_use]
    pub fn new(store: Arc<dyn AdminStore>, policy: OwnerPolicy) -> Self {
        Self { store, policy }
    }

    /// Every account, without password hashes.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<AdminUserView>, DirectoryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(AdminUserView::from)
            .collect())
    }

    /// Create an account. The owner address always gets full permissions.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for bad input or a non-owner asking for every
    /// permission, and `Conflict` if the address is taken.
    #[tracing::instrument(skip(self, input, added_by), fields(email = %input.email))]
    pub async fn create(
        &self,
        input: AdminInput,
        added_by: Option<AdminUserId>,
    ) -> Result<AdminUserView, DirectoryError> {
        let username = required(&input.username, "Username")?;
        let email = parse_email(&input.email)?;
        validate_password(&input.password)?;
        let (role, permissions) = self
            .policy
            .admin_grants(&email, input.role, input.permissions)?;
        ensure_unique(
            &email,
            self.store.find_by_email(&email).await?.map(|a| a.id),
            None,
        )?;

        let password_hash = hash_password(&input.password)?;
        let created = self
            .store
            .insert(NewAdminUser {
                username,
                email,
                password_hash,
                role,
                permissions,
                added_by,
            })
            .await?;

        tracing::info!(admin_id = %created.id, role = %created.role, "Admin account created");
        Ok(created.into())
    }

    /// # Errors
    ///
    /// Returns `NotFound`, `OwnerProtected` for the owner account,
    /// `Invalid`, or `Conflict`.
    #[tracing::instrument(skip(self, changes), fields(admin_id = %changes.id))]
    pub async fn update(&self, changes: AdminChanges) -> Result<AdminUserView, DirectoryError> {
        let mut admin = self.get(changes.id).await?;
        if self.policy.is_owner(&admin.email) {
            return Err(DirectoryError::OwnerProtected(
                "The main admin account cannot be modified".to_owned(),
            ));
        }

        if let Some(username) = changes.username {
            admin.username = required(&username, "Username")?;
        }

        if let Some(email) = changes.email {
            let email = parse_email(&email)?;
            if email != admin.email {
                if self.policy.is_owner(&email) {
                    return Err(DirectoryError::OwnerProtected(
                        "Cannot assign the main admin email to another account".to_owned(),
                    ));
                }
                ensure_unique(
                    &email,
                    self.store.find_by_email(&email).await?.map(|a| a.id),
                    Some(admin.id),
                )?;
                admin.email = email;
            }
        }

        // Stored grants are only re-checked when the request touches them.
        if changes.role.is_some() || changes.permissions.is_some() {
            let (role, permissions) = self.policy.admin_grants(
                &admin.email,
                changes.role.unwrap_or(admin.role),
                changes.permissions.unwrap_or(admin.permissions),
            )?;
            admin.role = role;
            admin.permissions = permissions;
        }

        if let Some(password) = changes.password {
            validate_password(&password)?;
            admin.password_hash = hash_password(&password)?;
        }

        admin.updated_at = Utc::now();
        let updated = self.store.update(&admin).await?;
        Ok(updated.into())
    }

    /// # Errors
    ///
    /// Returns `NotFound`, or `OwnerProtected` for the owner account.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AdminUserId) -> Result<(), DirectoryError> {
        let admin = self.get(id).await?;
        self.policy.guard_delete(&admin.email, "account")?;

        if !self.store.delete(id).await? {
            return Err(DirectoryError::NotFound("Admin"));
        }
        tracing::info!("Admin account deleted");
        Ok(())
    }

    /// Delete every non-owner account holding every permission.
    ///
    /// Returns how many accounts were removed.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store fails.
    pub async fn enforce_single_super_admin(&self) -> Result<usize, DirectoryError> {
        let mut removed = 0;
        for admin in self.store.list().await? {
            if admin.permissions.is_full() && !self.policy.is_owner(&admin.email) {
                self.store.delete(admin.id).await?;
                tracing::warn!(
                    admin_id = %admin.id,
                    email = %admin.email,
                    "Removed extra super admin account"
                );
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn get(&self, id: AdminUserId) -> Result<AdminUser, DirectoryError> {
        self.store
            .get(id)
            .await?
            .ok_or(DirectoryError::NotFound("Admin"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryAdminStore, MemoryRecipientStore};

    const OWNER: &str = "owner@bluelender.com";

    fn policy() -> OwnerPolicy {
        OwnerPolicy::new(Email::parse(OWNER).unwrap())
    }

    fn recipients() -> RecipientDirectory {
        RecipientDirectory::new(Arc::new(MemoryRecipientStore::default()), policy())
    }

    fn admins() -> (AdminDirectory, Arc<MemoryAdminStore>) {
        let store = Arc::new(MemoryAdminStore::default());
        (AdminDirectory::new(store.clone(), policy()), store)
    }

    fn recipient_input(email: &str, active: bool) -> RecipientInput {
        RecipientInput {
            name: "Someone".to_owned(),
            email: email.to_owned(),
            active,
        }
    }

    fn admin_input(email: &str, permissions: Permissions) -> AdminInput {
        AdminInput {
            username: "someone".to_owned(),
            email: email.to_owned(),
            password: "long enough".to_owned(),
            role: AdminRole::SubAdmin,
            permissions,
        }
    }

    #[tokio::test]
    async fn test_owner_recipient_forced_active_and_protected() {
        let directory = recipients();
        let owner = directory.create(recipient_input(OWNER, false)).await.unwrap();
        assert!(owner.active);
        assert!(owner.is_main_admin);

        let deactivate = directory
            .update(RecipientChanges {
                id: owner.id,
                name: None,
                email: None,
                active: Some(false),
            })
            .await;
        assert!(matches!(deactivate, Err(DirectoryError::OwnerProtected(_))));

        let readdress = directory
            .update(RecipientChanges {
                id: owner.id,
                name: None,
                email: Some("new@bluelender.com".to_owned()),
                active: None,
            })
            .await;
        assert!(matches!(readdress, Err(DirectoryError::OwnerProtected(_))));

        assert!(matches!(
            directory.delete(owner.id).await,
            Err(DirectoryError::OwnerProtected(_))
        ));
        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recipient_uniqueness() {
        let directory = recipients();
        let first = directory
            .create(recipient_input("ops@bluelender.com", true))
            .await
            .unwrap();
        let second = directory
            .create(recipient_input("sales@bluelender.com", true))
            .await
            .unwrap();

        assert!(matches!(
            directory
                .create(recipient_input("ops@bluelender.com", true))
                .await,
            Err(DirectoryError::Conflict(_))
        ));

        let clash = directory
            .update(RecipientChanges {
                id: second.id,
                name: None,
                email: Some("ops@bluelender.com".to_owned()),
                active: None,
            })
            .await;
        assert!(matches!(clash, Err(DirectoryError::Conflict(_))));

        // Re-submitting its own address is not a conflict
        let same = directory
            .update(RecipientChanges {
                id: first.id,
                name: Some("Operations".to_owned()),
                email: Some("ops@bluelender.com".to_owned()),
                active: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(same.name, "Operations");
        assert!(!same.active);

        directory.delete(second.id).await.unwrap();
        assert!(matches!(
            directory.delete(second.id).await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_owner_admin_gets_full_permissions_and_is_protected() {
        let (directory, _) = admins();
        let owner = directory
            .create(admin_input(OWNER, Permissions::NONE), None)
            .await
            .unwrap();
        assert_eq!(owner.permissions, Permissions::FULL);
        assert_eq!(owner.role, AdminRole::Admin);

        let demote = directory
            .update(AdminChanges {
                id: owner.id,
                username: None,
                email: None,
                password: None,
                role: Some(AdminRole::SubAdmin),
                permissions: Some(Permissions::NONE),
            })
            .await;
        assert!(matches!(demote, Err(DirectoryError::OwnerProtected(_))));

        assert!(matches!(
            directory.delete(owner.id).await,
            Err(DirectoryError::OwnerProtected(_))
        ));

        let list = directory.list().await.unwrap();
        assert_eq!(list[0].permissions, Permissions::FULL);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_hold_every_permission() {
        let (directory, _) = admins();
        assert!(matches!(
            directory
                .create(admin_input("ops@bluelender.com", Permissions::FULL), None)
                .await,
            Err(DirectoryError::Invalid(_))
        ));

        let partial = Permissions {
            view_applications: true,
            ..Permissions::NONE
        };
        let owner = directory
            .create(admin_input(OWNER, Permissions::NONE), None)
            .await
            .unwrap();
        let ops = directory
            .create(admin_input("ops@bluelender.com", partial), Some(owner.id))
            .await
            .unwrap();
        assert_eq!(ops.added_by, Some(owner.id));

        let promote = directory
            .update(AdminChanges {
                id: ops.id,
                username: None,
                email: None,
                password: None,
                role: None,
                permissions: Some(Permissions::FULL),
            })
            .await;
        assert!(matches!(promote, Err(DirectoryError::Invalid(_))));

        let taken = directory
            .create(admin_input("ops@bluelender.com", partial), None)
            .await;
        assert!(matches!(taken, Err(DirectoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_full_account_accepts_updates_that_leave_grants_alone() {
        let (directory, store) = admins();
        let legacy = store
            .insert(NewAdminUser {
                username: "legacy".to_owned(),
                email: Email::parse("legacy@bluelender.com").unwrap(),
                password_hash: String::new(),
                role: AdminRole::Admin,
                permissions: Permissions::FULL,
                added_by: None,
            })
            .await
            .unwrap();

        let renamed = directory
            .update(AdminChanges {
                id: legacy.id,
                username: Some("Legacy Ops".to_owned()),
                email: None,
                password: None,
                role: None,
                permissions: None,
            })
            .await
            .unwrap();
        assert_eq!(renamed.username, "Legacy Ops");
        assert_eq!(renamed.permissions, Permissions::FULL);

        let keep_full = directory
            .update(AdminChanges {
                id: legacy.id,
                username: None,
                email: None,
                password: None,
                role: Some(AdminRole::SubAdmin),
                permissions: None,
            })
            .await;
        assert!(matches!(keep_full, Err(DirectoryError::Invalid(_))));

        let reduced = directory
            .update(AdminChanges {
                id: legacy.id,
                username: None,
                email: None,
                password: None,
                role: Some(AdminRole::SubAdmin),
                permissions: Some(Permissions::NONE),
            })
            .await
            .unwrap();
        assert_eq!(reduced.permissions, Permissions::NONE);
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let (directory, _) = admins();
        let mut input = admin_input("ops@bluelender.com", Permissions::NONE);
        input.password = "short".to_owned();
        assert!(matches!(
            directory.create(input, None).await,
            Err(DirectoryError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_enforce_single_super_admin() {
        let (directory, store) = admins();
        directory
            .create(admin_input(OWNER, Permissions::NONE), None)
            .await
            .unwrap();
        directory
            .create(admin_input("ops@bluelender.com", Permissions::NONE), None)
            .await
            .unwrap();
        // Inserted directly, bypassing the directory's checks
        store
            .insert(NewAdminUser {
                username: "rogue".to_owned(),
                email: Email::parse("rogue@bluelender.com").unwrap(),
                password_hash: String::new(),
                role: AdminRole::Admin,
                permissions: Permissions::FULL,
                added_by: None,
            })
            .await
            .unwrap();

        assert_eq!(directory.enforce_single_super_admin().await.unwrap(), 1);
        let remaining: Vec<_> = directory
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.email.into_inner())
            .collect();
        assert_eq!(remaining, vec![OWNER.to_owned(), "ops@bluelender.com".to_owned()]);
        assert_eq!(directory.enforce_single_super_admin().await.unwrap(), 0);
    }
}
