//! Application PDF rendering.
//!
//! Two variants are rendered from the same record: the admin copy carries
//! the submission metadata (client IP, user agent, receipt time), the
//! applicant copy does not.

mod pdf;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::models::application::{DocumentDescriptor, ExtraFields};
use crate::models::{ApplicationRecord, LoanInfo, PersonalInfo, RequestMetadata};

pub use pdf::PdfBuilder;

/// Which copy of the application to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfVariant {
    /// Internal copy with request metadata.
    Admin(RequestMetadata),
    /// Copy sent to the applicant.
    Applicant,
}

impl PdfVariant {
    /// Attachment filename for this variant.
    #[must_use]
    pub fn filename(&self, record: &ApplicationRecord) -> String {
        match self {
            Self::Admin(_) => format!("loan-application-{}.pdf", record.id),
            Self::Applicant => format!("loan-application-{}-copy.pdf", record.id),
        }
    }
}

/// Errors raised while rendering a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF rendering failed: {0}")]
    Layout(String),

    #[error("PDF rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Renders an application record to a PDF.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render `record` as the given variant.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` if the document cannot be produced.
    async fn render(
        &self,
        record: &ApplicationRecord,
        variant: &PdfVariant,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Text-layout renderer producing a paginated PDF 1.4 document.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    company_name: String,
}

impl PdfRenderer {
    #[must_use]
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
        }
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    #[tracing::instrument(skip_all, fields(application_id = %record.id))]
    async fn render(
        &self,
        record: &ApplicationRecord,
        variant: &PdfVariant,
    ) -> Result<Vec<u8>, RenderError> {
        let record = record.clone();
        let variant = variant.clone();
        let company = self.company_name.clone();

        let bytes = tokio::task::spawn_blocking(move || {
            layout(&company, &record, &variant, Utc::now()).finish()
        })
        .await?;

        if bytes.is_empty() {
            return Err(RenderError::Layout("empty document".to_owned()));
        }
        Ok(bytes)
    }
}

fn layout(
    company: &str,
    record: &ApplicationRecord,
    variant: &PdfVariant,
    rendered_at: DateTime<Utc>,
) -> PdfBuilder {
    let mut pdf = PdfBuilder::new();
    pdf.title(&format!("{company} Loan Application"));

    pdf.heading("Application")
        .field("Application ID", record.id.as_str())
        .field("Status", record.status.as_str())
        .field("Submitted", &timestamp(record.created_at));

    if let PdfVariant::Admin(metadata) = variant {
        pdf.heading("Submission Metadata")
            .field("IP Address", metadata.ip.as_deref().unwrap_or("unknown"))
            .field(
                "User Agent",
                metadata.user_agent.as_deref().unwrap_or("unknown"),
            )
            .field("Rendered", &timestamp(rendered_at));
    }

    pdf.heading("Applicant");
    person(&mut pdf, &record.personal_info);

    pdf.heading("Business")
        .field("Business Name", record.business_name());
    extras(&mut pdf, &record.business_info.extra);

    pdf.heading("Loan Request")
        .field("Loan Type", record.loan_info.label());
    match &record.loan_info {
        LoanInfo::Business(loan) => {
            pdf.field("Loan Amount", &format_amount(loan.loan_amount));
            optional(&mut pdf, "Loan Purpose", loan.loan_purpose.as_deref());
            extras(&mut pdf, &loan.extra);
        }
        LoanInfo::Equipment(loan) => {
            pdf.field("Loan Amount", &format_amount(loan.loan_amount));
            optional(
                &mut pdf,
                "Equipment",
                loan.equipment_description.as_deref(),
            );
            if loan.equipment_cost.is_some() {
                pdf.field("Equipment Cost", &format_amount(loan.equipment_cost));
            }
            optional(&mut pdf, "Vendor", loan.vendor_name.as_deref());
            extras(&mut pdf, &loan.extra);
        }
    }

    if let Some(co_applicant) = &record.co_applicant_info {
        pdf.heading("Co-Applicant");
        person(&mut pdf, co_applicant);
    }

    if !record.documents.is_empty() {
        pdf.heading("Documents");
        for (category, files) in &record.documents {
            let names = files
                .iter()
                .map(describe_document)
                .collect::<Vec<_>>()
                .join(", ");
            let names = if names.is_empty() {
                "none".to_owned()
            } else {
                names
            };
            pdf.field(&humanize(category), &names);
        }
    }

    pdf.heading("Signatures")
        .field("Applicant", &signature(Some(&record.signature)));
    if record.co_applicant_info.is_some() || record.co_applicant_signature.is_some() {
        pdf.field(
            "Co-Applicant",
            &signature(record.co_applicant_signature.as_deref()),
        );
    }

    pdf.paragraph(&format!(
        "By signing, the applicant certified that the information provided to {company} is true and complete."
    ));

    pdf
}

fn person(pdf: &mut PdfBuilder, info: &PersonalInfo) {
    pdf.field("Name", &info.full_name());
    optional(pdf, "Email", info.email());
    optional(pdf, "Phone", info.phone.as_deref());
    extras(pdf, &info.extra);
}

fn optional(pdf: &mut PdfBuilder, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        pdf.field(label, value);
    }
}

fn extras(pdf: &mut PdfBuilder, extra: &ExtraFields) {
    for (key, value) in extra {
        let text = display_value(value);
        if !text.is_empty() {
            pdf.field(&humanize(key), &text);
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Yes".to_owned(),
        Value::Bool(false) => "No".to_owned(),
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// `yearsInBusiness` -> `Years In Business`.
fn humanize(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c == '_' || c == '-' {
            out.push(' ');
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower {
            out.push(' ');
        }
        if out.is_empty() || out.ends_with(' ') {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    out
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `$1,234.50` style amount, or "not specified".
pub(crate) fn format_amount(amount: Option<Decimal>) -> String {
    let Some(amount) = amount else {
        return "not specified".to_owned();
    };
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

fn describe_document(doc: &DocumentDescriptor) -> String {
    match doc.size {
        Some(size) => format!("{} ({} KB)", doc.name, size.div_ceil(1024)),
        None => doc.name.clone(),
    }
}

/// Signatures arrive as `data:image/png;base64,...` URLs.
fn signature(data_url: Option<&str>) -> String {
    let Some(data_url) = data_url.map(str::trim).filter(|s| !s.is_empty()) else {
        return "not provided".to_owned();
    };
    let payload = data_url
        .split_once(',')
        .map_or(data_url, |(_, payload)| payload);
    match STANDARD.decode(payload) {
        Ok(bytes) => format!("captured ({} bytes)", bytes.len()),
        Err(_) => "captured".to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ApplicationSubmission;
    use bluelender_core::ApplicationId;
    use serde_json::json;

    fn record() -> ApplicationRecord {
        let submission: ApplicationSubmission = serde_json::from_value(json!({
            "personalInfo": {"firstName": "Jane", "lastName": "Doe", "email": "jane@x.com", "yearsAtAddress": 3},
            "businessInfo": {"businessName": "Acme"},
            "loanInfo": {"loanType": "Business", "loanAmount": 50000, "loanPurpose": "Expansion"},
            "signature": "data:image/png;base64,iVBORw0KGgo=",
            "documents": {"bankStatements": [{"name": "jan.pdf", "size": 2048}]}
        }))
        .unwrap();
        ApplicationRecord::from_submission(ApplicationId::parse("123456").unwrap(), submission, Utc::now())
    }

    fn text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[tokio::test]
    async fn test_admin_copy_includes_metadata() {
        let metadata = RequestMetadata {
            ip: Some("203.0.113.7".to_owned()),
            user_agent: Some("Mozilla/5.0".to_owned()),
        };
        let bytes = PdfRenderer::new("Blue Lender")
            .render(&record(), &PdfVariant::Admin(metadata))
            .await
            .unwrap();

        let body = text(&bytes);
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(body.contains("203.0.113.7"));
        assert!(body.contains("Mozilla/5.0"));
        assert!(body.contains("123456"));
    }

    #[tokio::test]
    async fn test_applicant_copy_omits_metadata() {
        let bytes = PdfRenderer::new("Blue Lender")
            .render(&record(), &PdfVariant::Applicant)
            .await
            .unwrap();

        let body = text(&bytes);
        assert!(!body.contains("Submission Metadata"));
        assert!(!body.contains("User Agent"));
        assert!(body.contains("Jane Doe"));
        assert!(body.contains("Years At Address"));
        assert!(body.contains("$50,000.00"));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("yearsInBusiness"), "Years In Business");
        assert_eq!(humanize("ssn_last4"), "Ssn Last4");
        assert_eq!(humanize("ein"), "Ein");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Some(Decimal::from(50_000))), "$50,000.00");
        assert_eq!(format_amount(Some("1234567.891".parse().unwrap())), "$1,234,567.89");
        assert_eq!(format_amount(Some(Decimal::from(999))), "$999.00");
        assert_eq!(format_amount(None), "not specified");
    }

    #[test]
    fn test_signature_summary() {
        assert_eq!(signature(None), "not provided");
        assert_eq!(signature(Some("  ")), "not provided");
        assert_eq!(
            signature(Some("data:image/png;base64,iVBORw0KGgo=")),
            "captured (8 bytes)"
        );
        assert_eq!(signature(Some("data:image/png;base64,@@@")), "captured");
    }

    #[test]
    fn test_filenames() {
        let record = record();
        assert_eq!(
            PdfVariant::Applicant.filename(&record),
            "loan-application-123456-copy.pdf"
        );
        assert_eq!(
            PdfVariant::Admin(RequestMetadata::default()).filename(&record),
            "loan-application-123456.pdf"
        );
    }
}
