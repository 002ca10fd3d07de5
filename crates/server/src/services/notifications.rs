//! Notification emails built from application records.
//!
//! Uses Askama HTML templates under `templates/email/`. Each builder returns
//! a [`SendRequest`] ready for a [`Notifier`](super::email::Notifier).

use askama::Template;

use bluelender_core::{ApplicationStatus, Email};

use super::documents::format_amount;
use super::email::{EmailAttachment, Recipients, SendRequest};
use crate::models::ApplicationRecord;

#[derive(Template)]
#[template(path = "email/admin_notification.html")]
struct AdminNotificationHtml<'a> {
    company: &'a str,
    admin_url: &'a str,
    application_id: &'a str,
    applicant_name: &'a str,
    applicant_email: Option<&'a str>,
    applicant_phone: Option<&'a str>,
    business_name: &'a str,
    loan_type: &'a str,
    loan_amount: &'a str,
    submitted_at: &'a str,
    has_co_applicant: bool,
    document_count: usize,
}

#[derive(Template)]
#[template(path = "email/applicant_confirmation.html")]
struct ApplicantConfirmationHtml<'a> {
    company: &'a str,
    first_name: &'a str,
    application_id: &'a str,
    business_name: &'a str,
    loan_type: &'a str,
}

#[derive(Template)]
#[template(path = "email/status_update.html")]
struct StatusUpdateHtml<'a> {
    company: &'a str,
    headline: &'a str,
    first_name: &'a str,
    application_id: &'a str,
    business_name: &'a str,
    status: ApplicationStatus,
}

/// Builds the three notification emails.
#[derive(Debug, Clone)]
pub struct EmailComposer {
    company_name: String,
    admin_url: String,
}

impl EmailComposer {
    #[must_use]
    pub fn new(company_name: impl Into<String>, base_url: &str) -> Self {
        Self {
            company_name: company_name.into(),
            admin_url: format!("{}/admin", base_url.trim_end_matches('/')),
        }
    }

    /// Internal notification of a new submission, admin PDF attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to render.
    pub fn admin_notification(
        &self,
        record: &ApplicationRecord,
        to: &[Email],
        pdf: EmailAttachment,
    ) -> Result<SendRequest, askama::Error> {
        let applicant_name = record.applicant_name();
        let loan_amount = format_amount(record.loan_info.amount());
        let submitted_at = record
            .created_at
            .format("%B %-d, %Y %H:%M UTC")
            .to_string();
        let document_count = record.documents.values().map(Vec::len).sum();

        let html = AdminNotificationHtml {
            company: &self.company_name,
            admin_url: &self.admin_url,
            application_id: record.id.as_str(),
            applicant_name: &applicant_name,
            applicant_email: record.personal_info.email(),
            applicant_phone: record.personal_info.phone.as_deref(),
            business_name: business_name(record),
            loan_type: record.loan_info.label(),
            loan_amount: &loan_amount,
            submitted_at: &submitted_at,
            has_co_applicant: record.co_applicant_info.is_some(),
            document_count,
        }
        .render()?;

        Ok(SendRequest {
            to: Recipients::from(to),
            subject: admin_subject(record),
            html,
            attachments: vec![pdf],
        })
    }

    /// Confirmation sent to the applicant, applicant PDF attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to render.
    pub fn applicant_confirmation(
        &self,
        record: &ApplicationRecord,
        to: &Email,
        pdf: EmailAttachment,
    ) -> Result<SendRequest, askama::Error> {
        let html = ApplicantConfirmationHtml {
            company: &self.company_name,
            first_name: record.personal_info.first_name.trim(),
            application_id: record.id.as_str(),
            business_name: business_name(record),
            loan_type: record.loan_info.label(),
        }
        .render()?;

        Ok(SendRequest {
            to: Recipients::from(to),
            subject: format!(
                "Your {} Loan Application #{} Was Received",
                self.company_name, record.id
            ),
            html,
            attachments: vec![pdf],
        })
    }

    /// Applicant email for a status change. Wording follows `record.status`;
    /// admin notes are not included.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to render.
    pub fn status_update(
        &self,
        record: &ApplicationRecord,
        to: &Email,
    ) -> Result<SendRequest, askama::Error> {
        let (subject, headline) = status_wording(record.status);
        let html = StatusUpdateHtml {
            company: &self.company_name,
            headline,
            first_name: record.personal_info.first_name.trim(),
            application_id: record.id.as_str(),
            business_name: business_name(record),
            status: record.status,
        }
        .render()?;

        Ok(SendRequest {
            to: Recipients::from(to),
            subject: format!("{subject} - #{}", record.id),
            html,
            attachments: Vec::new(),
        })
    }
}

/// `New Business Loan Application - Acme`.
#[must_use]
pub fn admin_subject(record: &ApplicationRecord) -> String {
    format!(
        "New {} Loan Application - {}",
        record.loan_info.label(),
        business_name(record)
    )
}

fn business_name(record: &ApplicationRecord) -> &str {
    match record.business_name() {
        "" => "Unnamed Business",
        name => name,
    }
}

const fn status_wording(status: ApplicationStatus) -> (&'static str, &'static str) {
    match status {
        ApplicationStatus::Approved => (
            "Your Loan Application Has Been Approved",
            "Your application has been approved",
        ),
        ApplicationStatus::Denied => (
            "Update on Your Loan Application",
            "An update on your application",
        ),
        ApplicationStatus::InReview => (
            "Your Loan Application Is Under Review",
            "Your application is under review",
        ),
        ApplicationStatus::Draft | ApplicationStatus::Submitted => (
            "Your Loan Application Status Changed",
            "Your application status changed",
        ),
    }
}
