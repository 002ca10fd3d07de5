//! Admin operations on submitted applications.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use bluelender_core::{ApplicationId, ApplicationStatus, Email};

use super::notifications::EmailComposer;
use super::outbox::{NotificationOutcome, NotificationTask, Outbox};
use super::submission::template_failure;
use crate::db::{ApplicationStore, RepositoryError};
use crate::models::{ApplicationPage, ApplicationRecord, EmailKind};

/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ApplicationAdminError {
    #[error("Application not found")]
    NotFound,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a status change.
#[derive(Debug)]
pub struct StatusUpdate {
    pub record: ApplicationRecord,
    /// Applicant email stage, present only when the status change notifies.
    pub notification: Option<NotificationTask<NotificationOutcome>>,
}

/// List, inspect, update, and delete applications.
#[derive(Clone)]
pub struct ApplicationAdmin {
    applications: Arc<dyn ApplicationStore>,
    outbox: Outbox,
    composer: EmailComposer,
}

impl ApplicationAdmin {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        outbox: Outbox,
        composer: EmailComposer,
    ) -> Self {
        Self {
            applications,
            outbox,
            composer,
        }
    }

    /// One page of applications, newest first.
    ///
    /// `page` defaults to 1 and `limit` to [`DEFAULT_PAGE_SIZE`], capped at
    /// [`MAX_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a zero page or limit.
    pub async fn list(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<ApplicationPage, ApplicationAdminError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        if page == 0 {
            return Err(ApplicationAdminError::Invalid(
                "page must be at least 1".to_owned(),
            ));
        }
        if limit == 0 {
            return Err(ApplicationAdminError::Invalid(
                "limit must be at least 1".to_owned(),
            ));
        }

        let offset = u64::from(page - 1) * u64::from(limit);
        let (applications, total) = self.applications.list(offset, limit).await?;
        Ok(ApplicationPage::new(applications, page, limit, total))
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no application has this ID.
    pub async fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, ApplicationAdminError> {
        self.applications
            .get(id)
            .await?
            .ok_or(ApplicationAdminError::NotFound)
    }

    /// Change an application's status and optionally its notes.
    ///
    /// Moving into a status that notifies the applicant from a different
    /// status sends exactly one status email in the background.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no application has this ID.
    #[tracing::instrument(skip(self, notes), fields(application_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        notes: Option<&str>,
    ) -> Result<StatusUpdate, ApplicationAdminError> {
        let transition = self
            .applications
            .update_status(id, status, notes, Utc::now())
            .await?
            .ok_or(ApplicationAdminError::NotFound)?;

        tracing::info!(previous = %transition.previous, "Application status updated");

        let notification = (status.notifies_applicant() && transition.previous != status)
            .then(|| self.spawn_status_email(transition.record.clone()));

        Ok(StatusUpdate {
            record: transition.record,
            notification,
        })
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no application has this ID.
    #[tracing::instrument(skip(self), fields(application_id = %id))]
    pub async fn delete(&self, id: &ApplicationId) -> Result<(), ApplicationAdminError> {
        if self.applications.delete(id).await? {
            tracing::info!("Application deleted");
            Ok(())
        } else {
            Err(ApplicationAdminError::NotFound)
        }
    }

    fn spawn_status_email(&self, record: ApplicationRecord) -> NotificationTask<NotificationOutcome> {
        let outbox = self.outbox.clone();
        let composer = self.composer.clone();

        NotificationTask::new(tokio::spawn(async move {
            let Some(to) = record.personal_info.email().and_then(|e| Email::parse(e).ok()) else {
                tracing::info!(application_id = %record.id, "No applicant email, skipping status update");
                return NotificationOutcome::Skipped;
            };
            match composer.status_update(&record, &to) {
                Ok(request) => {
                    outbox
                        .send(EmailKind::StatusUpdate, Some(&record.id), request)
                        .await
                }
                Err(e) => template_failure(&e),
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::db::memory::{MemoryApplicationStore, MemoryFailedEmailStore};
    use crate::models::ApplicationSubmission;
    use crate::services::email::{DeliveryReceipt, DispatchError, Notifier, SendRequest};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<SendRequest>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, request: SendRequest) -> Result<DeliveryReceipt, DispatchError> {
            self.sent.lock().await.push(request);
            Ok(DeliveryReceipt {
                message_id: "<m@bluelender.com>".to_owned(),
                accepted: Vec::new(),
            })
        }
    }

    async fn seeded(count: u32) -> (ApplicationAdmin, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryApplicationStore::default());
        for n in 0..count {
            let submission: ApplicationSubmission = serde_json::from_value(json!({
                "personalInfo": {"firstName": "Jane", "lastName": "Doe", "email": "jane@x.com"},
                "businessInfo": {"businessName": format!("Acme {n}")},
                "loanInfo": {"loanType": "Business"},
                "signature": "sig"
            }))
            .unwrap();
            let id = ApplicationId::parse(&(200_000 + n).to_string()).unwrap();
            let at = Utc::now() + chrono::Duration::seconds(i64::from(n));
            store
                .save(&ApplicationRecord::from_submission(id, submission, at))
                .await
                .unwrap();
        }

        let notifier = Arc::new(RecordingNotifier::default());
        let admin = ApplicationAdmin::new(
            store,
            Outbox::new(notifier.clone(), Arc::new(MemoryFailedEmailStore::default())),
            EmailComposer::new("Blue Lender", "https://apply.bluelender.com"),
        );
        (admin, notifier)
    }

    fn id(n: u32) -> ApplicationId {
        ApplicationId::parse(&(200_000 + n).to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let (admin, _) = seeded(5).await;

        let page = admin.list(Some(1), Some(2)).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.applications[0].id, id(4));
        assert_eq!(page.applications[1].id, id(3));

        let last = admin.list(Some(3), Some(2)).await.unwrap();
        assert_eq!(last.applications.len(), 1);
        assert_eq!(last.applications[0].id, id(0));

        let defaulted = admin.list(None, Some(1_000)).await.unwrap();
        assert_eq!(defaulted.limit, MAX_PAGE_SIZE);
        assert_eq!(defaulted.page, 1);

        assert!(matches!(
            admin.list(Some(0), None).await,
            Err(ApplicationAdminError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_status_email_sent_once_per_change() {
        let (admin, notifier) = seeded(1).await;

        let update = admin
            .update_status(&id(0), ApplicationStatus::Approved, Some("Welcome aboard"))
            .await
            .unwrap();
        assert_eq!(update.record.status, ApplicationStatus::Approved);
        assert_eq!(update.record.notes.as_deref(), Some("Welcome aboard"));
        let outcome = update.notification.unwrap().wait().await.unwrap();
        assert!(outcome.is_sent());

        let repeat = admin
            .update_status(&id(0), ApplicationStatus::Approved, None)
            .await
            .unwrap();
        assert!(repeat.notification.is_none());
        assert_eq!(repeat.record.notes.as_deref(), Some("Welcome aboard"));

        let sent = notifier.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Approved"));
    }

    #[tokio::test]
    async fn test_non_notifying_status_sends_nothing() {
        let (admin, notifier) = seeded(1).await;
        let update = admin
            .update_status(&id(0), ApplicationStatus::Draft, None)
            .await
            .unwrap();
        assert!(update.notification.is_none());
        assert!(notifier.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_application() {
        let (admin, _) = seeded(0).await;
        assert!(matches!(
            admin.get(&id(9)).await,
            Err(ApplicationAdminError::NotFound)
        ));
        assert!(matches!(
            admin
                .update_status(&id(9), ApplicationStatus::Denied, None)
                .await,
            Err(ApplicationAdminError::NotFound)
        ));
        assert!(matches!(
            admin.delete(&id(9)).await,
            Err(ApplicationAdminError::NotFound)
        ));
    }
}
