//! Best-effort notification delivery backed by the failed-email queue.
//!
//! [`Outbox::send`] never fails its caller's operation: a message that
//! cannot be delivered is logged and queued, and [`FailedEmailRetrier`]
//! re-sends queued messages later.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use bluelender_core::{ApplicationId, Email};

use super::email::{DeliveryReceipt, DispatchError, Notifier, Recipients, SendRequest};
use crate::db::{FailedEmailStore, RepositoryError};
use crate::models::{EmailKind, FailedEmail, NewFailedEmail};

/// A queued message is dropped once it has failed this many times.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Result of one best-effort notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent(DeliveryReceipt),
    /// Delivery failed; the message was queued when the failure was retryable.
    Failed(String),
    /// Nothing to send (no applicant email, no status change).
    Skipped,
}

impl NotificationOutcome {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Outcomes of the notifications sent for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub admin: NotificationOutcome,
    pub applicant: NotificationOutcome,
}

/// Handle to a detached notification stage.
///
/// Dropping it leaves the task running.
#[derive(Debug)]
pub struct NotificationTask<T = NotificationReport>(JoinHandle<T>);

impl<T> NotificationTask<T> {
    pub(crate) const fn new(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }

    /// Wait for the stage to finish. `None` if the task panicked or was
    /// cancelled.
    pub async fn wait(self) -> Option<T> {
        self.0.await.ok()
    }
}

/// Sends through a [`Notifier`] and queues retryable failures.
#[derive(Clone)]
pub struct Outbox {
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn FailedEmailStore>,
}

impl Outbox {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, queue: Arc<dyn FailedEmailStore>) -> Self {
        Self { notifier, queue }
    }

    /// Send `request`, queueing it if delivery fails.
    #[tracing::instrument(skip(self, request), fields(subject = %request.subject))]
    pub async fn send(
        &self,
        kind: EmailKind,
        application_id: Option<&ApplicationId>,
        request: SendRequest,
    ) -> NotificationOutcome {
        let retained = request.clone();
        match self.notifier.send(request).await {
            Ok(receipt) => NotificationOutcome::Sent(receipt),
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Notification failed");
                if is_retryable(&e) {
                    self.enqueue(kind, application_id, retained, &e).await;
                }
                NotificationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn enqueue(
        &self,
        kind: EmailKind,
        application_id: Option<&ApplicationId>,
        request: SendRequest,
        error: &DispatchError,
    ) {
        let recipients = valid_recipients(&request.to);
        if recipients.is_empty() {
            return;
        }

        let entry = NewFailedEmail {
            kind,
            application_id: application_id.cloned(),
            recipients,
            subject: request.subject,
            html: request.html,
            attachments: request.attachments,
            last_error: error.to_string(),
        };

        match self.queue.enqueue(entry).await {
            Ok(queued) => {
                tracing::info!(failed_email_id = %queued.id, kind = %kind, "Queued email for retry");
            }
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    sentry_event_id = %event_id,
                    "Failed to queue undelivered email"
                );
            }
        }
    }
}

/// Validation failures would fail again on every retry.
const fn is_retryable(error: &DispatchError) -> bool {
    matches!(
        error,
        DispatchError::Transport(_) | DispatchError::Delivery { .. }
    )
}

fn valid_recipients(to: &Recipients) -> Vec<Email> {
    match to {
        Recipients::One(address) => Email::parse(address).into_iter().collect(),
        Recipients::Many(addresses) => addresses
            .iter()
            .filter_map(|address| Email::parse(address).ok())
            .collect(),
    }
}

/// Totals from one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub sent: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Re-sends queued notifications.
#[derive(Clone)]
pub struct FailedEmailRetrier {
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn FailedEmailStore>,
}

impl FailedEmailRetrier {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, queue: Arc<dyn FailedEmailStore>) -> Self {
        Self { notifier, queue }
    }

    /// Retry up to `limit` queued messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the queue cannot be read or updated.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, limit: u32) -> Result<RetrySummary, RepositoryError> {
        let mut summary = RetrySummary::default();

        for entry in self.queue.pending(limit).await? {
            match self.notifier.send(request_for(&entry)).await {
                Ok(receipt) => {
                    self.queue.remove(entry.id).await?;
                    tracing::info!(
                        failed_email_id = %entry.id,
                        message_id = %receipt.message_id,
                        "Queued email delivered"
                    );
                    summary.sent += 1;
                }
                Err(e) if entry.attempts + 1 >= MAX_DELIVERY_ATTEMPTS => {
                    self.queue.remove(entry.id).await?;
                    tracing::error!(
                        failed_email_id = %entry.id,
                        kind = %entry.kind,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Giving up on queued email"
                    );
                    summary.dropped += 1;
                }
                Err(e) => {
                    self.queue
                        .record_failure(entry.id, &e.to_string(), Utc::now())
                        .await?;
                    tracing::warn!(
                        failed_email_id = %entry.id,
                        attempts = entry.attempts + 1,
                        error = %e,
                        "Queued email failed again"
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Sweep the queue every `every` until the runtime shuts down.
    ///
    /// The first sweep runs one interval after start. Sweep errors are
    /// logged and the loop continues.
    pub fn spawn_sweeper(self, every: Duration, batch: u32) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match self.run_once(batch).await {
                    Ok(summary) if summary == RetrySummary::default() => {}
                    Ok(summary) => tracing::info!(
                        sent = summary.sent,
                        failed = summary.failed,
                        dropped = summary.dropped,
                        "Failed-email sweep finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Failed-email sweep could not read the queue"),
                }
            }
        })
    }
}

fn request_for(entry: &FailedEmail) -> SendRequest {
    SendRequest {
        to: Recipients::from(entry.recipients.as_slice()),
        subject: entry.subject.clone(),
        html: entry.html.clone(),
        attachments: entry.attachments.clone(),
    }
}
