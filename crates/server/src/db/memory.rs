//! In-memory store implementations.
//!
//! Same semantics as the Postgres repositories (unique emails, newest-first
//! listing, last-write-wins saves) without a database. Used by the test
//! suites.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bluelender_core::{
    AdminUserId, ApplicationId, ApplicationStatus, Email, FailedEmailId, RecipientId,
};

use super::{
    AdminStore, ApplicationStore, FailedEmailStore, RecipientStore, RepositoryError,
    StatusTransition,
};
use crate::models::{
    AdminUser, ApplicationRecord, EmailRecipient, FailedEmail, NewAdminUser, NewFailedEmail,
    NewRecipient,
};

/// Serial ID source starting at 1.
#[derive(Debug)]
struct Serial(AtomicI32);

impl Default for Serial {
    fn default() -> Self {
        Self(AtomicI32::new(1))
    }
}

impl Serial {
    fn next(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

// =============================================================================
// Applications
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryApplicationStore {
    records: RwLock<BTreeMap<ApplicationId, ApplicationRecord>>,
}

impl MemoryApplicationStore {
    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn exists(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        Ok(self.records.read().await.contains_key(id))
    }

    async fn save(&self, record: &ApplicationRecord) -> Result<(), RepositoryError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(
        &self,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<ApplicationRecord>, u64), RepositoryError> {
        let records = self.records.read().await;
        let mut all: Vec<&ApplicationRecord> = records.values().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let page = all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page, records.len() as u64))
    }

    async fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<StatusTransition>, RepositoryError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(None);
        };

        let previous = record.status;
        record.status = status;
        if let Some(notes) = notes {
            record.notes = Some(notes.to_owned());
        }
        record.updated_at = at;

        Ok(Some(StatusTransition {
            previous,
            record: record.clone(),
        }))
    }

    async fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

// =============================================================================
// Recipients
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryRecipientStore {
    rows: RwLock<Vec<EmailRecipient>>,
    serial: Serial,
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn list(&self) -> Result<Vec<EmailRecipient>, RepositoryError> {
        Ok(self.rows.read().await.clone())
    }

    async fn get(&self, id: RecipientId) -> Result<Option<EmailRecipient>, RepositoryError> {
        Ok(self.rows.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<EmailRecipient>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.email == *email)
            .cloned())
    }

    async fn insert(&self, recipient: NewRecipient) -> Result<EmailRecipient, RepositoryError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|r| r.email == recipient.email) {
            return Err(RepositoryError::Conflict(
                "recipient email already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let row = EmailRecipient {
            id: RecipientId::new(self.serial.next()),
            name: recipient.name,
            email: recipient.email,
            active: recipient.active,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, recipient: &EmailRecipient) -> Result<EmailRecipient, RepositoryError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|r| r.id != recipient.id && r.email == recipient.email)
        {
            return Err(RepositoryError::Conflict(
                "recipient email already exists".to_owned(),
            ));
        }

        let row = rows
            .iter_mut()
            .find(|r| r.id == recipient.id)
            .ok_or(RepositoryError::NotFound)?;
        row.name.clone_from(&recipient.name);
        row.email = recipient.email.clone();
        row.active = recipient.active;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, id: RecipientId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }
}

// =============================================================================
// Admin users
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryAdminStore {
    rows: RwLock<Vec<AdminUser>>,
    serial: Serial,
}

#[async_trait]
impl AdminStore for MemoryAdminStore {
    async fn list(&self) -> Result<Vec<AdminUser>, RepositoryError> {
        Ok(self.rows.read().await.clone())
    }

    async fn get(&self, id: AdminUserId) -> Result<Option<AdminUser>, RepositoryError> {
        Ok(self.rows.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<AdminUser>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|a| a.email == *email)
            .cloned())
    }

    async fn insert(&self, admin: NewAdminUser) -> Result<AdminUser, RepositoryError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|a| a.email == admin.email) {
            return Err(RepositoryError::Conflict(
                "admin email already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let row = AdminUser {
            id: AdminUserId::new(self.serial.next()),
            username: admin.username,
            email: admin.email,
            password_hash: admin.password_hash,
            role: admin.role,
            permissions: admin.permissions,
            added_by: admin.added_by,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, admin: &AdminUser) -> Result<AdminUser, RepositoryError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|a| a.id != admin.id && a.email == admin.email) {
            return Err(RepositoryError::Conflict(
                "admin email already exists".to_owned(),
            ));
        }

        let row = rows
            .iter_mut()
            .find(|a| a.id == admin.id)
            .ok_or(RepositoryError::NotFound)?;
        *row = AdminUser {
            created_at: row.created_at,
            added_by: row.added_by,
            updated_at: Utc::now(),
            ..admin.clone()
        };
        Ok(row.clone())
    }

    async fn delete(&self, id: AdminUserId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|a| a.id != id);
        Ok(rows.len() != before)
    }
}

// =============================================================================
// Failed emails
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryFailedEmailStore {
    rows: RwLock<Vec<FailedEmail>>,
    serial: Serial,
}

impl MemoryFailedEmailStore {
    /// Snapshot of every queued entry.
    pub async fn all(&self) -> Vec<FailedEmail> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl FailedEmailStore for MemoryFailedEmailStore {
    async fn enqueue(&self, email: NewFailedEmail) -> Result<FailedEmail, RepositoryError> {
        let now = Utc::now();
        let row = FailedEmail {
            id: FailedEmailId::new(self.serial.next()),
            kind: email.kind,
            application_id: email.application_id,
            recipients: email.recipients,
            subject: email.subject,
            html: email.html,
            attachments: email.attachments,
            last_error: email.last_error,
            attempts: 1,
            created_at: now,
            last_attempt_at: now,
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn pending(&self, limit: u32) -> Result<Vec<FailedEmail>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn record_failure(
        &self,
        id: FailedEmailId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.attempts += 1;
        error.clone_into(&mut row.last_error);
        row.last_attempt_at = at;
        Ok(())
    }

    async fn remove(&self, id: FailedEmailId) -> Result<(), RepositoryError> {
        self.rows.write().await.retain(|r| r.id != id);
        Ok(())
    }
}
