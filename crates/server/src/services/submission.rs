//! Loan application submission pipeline.
//!
//! Order of operations:
//!
//! 1. Validate the form and draw an application ID.
//! 2. Persist the record. Nothing is emailed unless this succeeds.
//! 3. Render the admin and applicant PDFs concurrently.
//! 4. Hand the PDFs to a detached notification stage that emails the
//!    resolved recipient list and the applicant.
//!
//! Failures in steps 1-3 fail the submission. Notification failures are
//! logged and queued, and never change the result.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use bluelender_core::{ApplicationId, Email};

use super::documents::{DocumentRenderer, PdfVariant, RenderError};
use super::email::EmailAttachment;
use super::notifications::EmailComposer;
use super::outbox::{NotificationOutcome, NotificationReport, NotificationTask, Outbox};
use super::recipients;
use crate::db::{ApplicationStore, RecipientStore, RepositoryError};
use crate::models::{ApplicationRecord, ApplicationSubmission, EmailKind, RequestMetadata};

/// How many IDs are drawn before accepting a colliding one.
const MAX_ID_DRAWS: usize = 5;

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The form is missing a required field.
    #[error("{0}")]
    Invalid(String),

    #[error("failed to save application: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("failed to generate application documents: {0}")]
    Render(#[from] RenderError),
}

/// Accepted submission.
#[derive(Debug)]
pub struct SubmissionReceipt {
    pub id: ApplicationId,
    /// The detached email stage. The HTTP handler drops it.
    pub notifications: NotificationTask,
}

/// Runs the submission pipeline.
#[derive(Clone)]
pub struct SubmissionService {
    applications: Arc<dyn ApplicationStore>,
    recipients: Arc<dyn RecipientStore>,
    renderer: Arc<dyn DocumentRenderer>,
    outbox: Outbox,
    composer: EmailComposer,
    owner: Email,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        recipients: Arc<dyn RecipientStore>,
        renderer: Arc<dyn DocumentRenderer>,
        outbox: Outbox,
        composer: EmailComposer,
        owner: Email,
    ) -> Self {
        Self {
            applications,
            recipients,
            renderer,
            outbox,
            composer,
            owner,
        }
    }

    /// Accept a submitted form.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Invalid` for missing or malformed fields,
    /// `Persistence` if the record cannot be saved, and `Render` if either
    /// PDF cannot be produced.
    #[tracing::instrument(skip_all, fields(application_id = tracing::field::Empty))]
    pub async fn submit(
        &self,
        submission: ApplicationSubmission,
        metadata: RequestMetadata,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        validate(&submission)?;

        let id = self.draw_id().await?;
        tracing::Span::current().record("application_id", id.as_str());

        let record = ApplicationRecord::from_submission(id, submission, Utc::now());
        self.applications.save(&record).await?;
        tracing::info!(
            application_id = %record.id,
            loan_type = record.loan_info.label(),
            "Application saved"
        );

        let admin_variant = PdfVariant::Admin(metadata);
        let (admin_pdf, applicant_pdf) = tokio::try_join!(
            self.renderer.render(&record, &admin_variant),
            self.renderer.render(&record, &PdfVariant::Applicant),
        )?;

        let admin_pdf = EmailAttachment::pdf(admin_variant.filename(&record), admin_pdf);
        let applicant_pdf =
            EmailAttachment::pdf(PdfVariant::Applicant.filename(&record), applicant_pdf);

        let id = record.id.clone();
        let service = self.clone();
        let handle = tokio::spawn(async move {
            service.notify(record, admin_pdf, applicant_pdf).await
        });

        Ok(SubmissionReceipt {
            id,
            notifications: NotificationTask::new(handle),
        })
    }

    /// Draw IDs until one is unused, accepting the last draw if all collide.
    async fn draw_id(&self) -> Result<ApplicationId, RepositoryError> {
        let mut id = ApplicationId::generate();
        for _ in 1..MAX_ID_DRAWS {
            if !self.applications.exists(&id).await? {
                return Ok(id);
            }
            tracing::warn!(application_id = %id, "Application ID collision, drawing again");
            id = ApplicationId::generate();
        }
        Ok(id)
    }

    async fn notify(
        &self,
        record: ApplicationRecord,
        admin_pdf: EmailAttachment,
        applicant_pdf: EmailAttachment,
    ) -> NotificationReport {
        let stored = match self.recipients.list().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load email recipients, notifying owner only");
                Vec::new()
            }
        };
        let to = recipients::resolve(&stored, &self.owner);

        let admin = match self.composer.admin_notification(&record, &to, admin_pdf) {
            Ok(request) => {
                self.outbox
                    .send(EmailKind::AdminNotification, Some(&record.id), request)
                    .await
            }
            Err(e) => template_failure(&e),
        };

        let applicant = match record.personal_info.email().map(Email::parse) {
            None => NotificationOutcome::Skipped,
            Some(Err(e)) => {
                tracing::warn!(application_id = %record.id, error = %e, "Skipping applicant confirmation");
                NotificationOutcome::Skipped
            }
            Some(Ok(email)) => {
                match self
                    .composer
                    .applicant_confirmation(&record, &email, applicant_pdf)
                {
                    Ok(request) => {
                        self.outbox
                            .send(EmailKind::ApplicantConfirmation, Some(&record.id), request)
                            .await
                    }
                    Err(e) => template_failure(&e),
                }
            }
        };

        NotificationReport { admin, applicant }
    }
}

pub(crate) fn template_failure(e: &askama::Error) -> NotificationOutcome {
    let event_id = sentry::capture_error(e);
    tracing::error!(error = %e, sentry_event_id = %event_id, "Email template failed to render");
    NotificationOutcome::Failed(e.to_string())
}

fn validate(submission: &ApplicationSubmission) -> Result<(), SubmissionError> {
    let invalid = |message: &str| Err(SubmissionError::Invalid(message.to_owned()));
    let personal = &submission.personal_info;

    if personal.first_name.trim().is_empty() {
        return invalid("First name is required");
    }
    if personal.last_name.trim().is_empty() {
        return invalid("Last name is required");
    }
    if let Some(email) = personal.email()
        && Email::parse(email).is_err()
    {
        return invalid("A valid email address is required");
    }
    if submission.business_info.business_name.trim().is_empty() {
        return invalid("Business name is required");
    }
    if submission
        .signature
        .as_deref()
        .is_none_or(|s| s.trim().is_empty())
    {
        return invalid("Signature is required");
    }
    Ok(())
}
