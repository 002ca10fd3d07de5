//! Loan application domain types.
//!
//! A submitted form arrives as an [`ApplicationSubmission`]. The orchestrator
//! stamps it with an ID, a status, and timestamps to produce the persisted
//! [`ApplicationRecord`]. Every section keeps unknown form fields in a
//! flattened `extra` map so nothing the form sends is lost.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bluelender_core::{ApplicationId, ApplicationStatus};

/// Unrecognised form fields, preserved verbatim.
pub type ExtraFields = Map<String, Value>;

/// Applicant (or co-applicant) identity section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl PersonalInfo {
    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Applicant email if one was entered.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// Business section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    #[serde(default)]
    pub business_name: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Fields of a general business loan request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessLoan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_purpose: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Fields of an equipment financing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentLoan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Loan request, tagged by `loanType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loanType")]
pub enum LoanInfo {
    Business(BusinessLoan),
    Equipment(EquipmentLoan),
}

impl LoanInfo {
    /// Display label of the loan type.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Business(_) => "Business",
            Self::Equipment(_) => "Equipment",
        }
    }

    /// Requested amount, if given.
    #[must_use]
    pub const fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Business(loan) => loan.loan_amount,
            Self::Equipment(loan) => loan.loan_amount,
        }
    }
}

/// Descriptor of one uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Client details captured with a submission. Shown only on the admin copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Raw form payload posted to the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub business_info: BusinessInfo,
    pub loan_info: LoanInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_applicant_info: Option<PersonalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_applicant_signature: Option<String>,
    #[serde(default)]
    pub documents: BTreeMap<String, Vec<DocumentDescriptor>>,
}

/// A persisted loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub personal_info: PersonalInfo,
    pub business_info: BusinessInfo,
    pub loan_info: LoanInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_applicant_info: Option<PersonalInfo>,
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_applicant_signature: Option<String>,
    #[serde(default)]
    pub documents: BTreeMap<String, Vec<DocumentDescriptor>>,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Build a freshly submitted record from form data.
    #[must_use]
    pub fn from_submission(
        id: ApplicationId,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            personal_info: submission.personal_info,
            business_info: submission.business_info,
            loan_info: submission.loan_info,
            co_applicant_info: submission.co_applicant_info,
            signature: submission.signature.unwrap_or_default(),
            co_applicant_signature: submission.co_applicant_signature,
            documents: submission.documents,
            status: ApplicationStatus::Submitted,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applicant's full name.
    #[must_use]
    pub fn applicant_name(&self) -> String {
        self.personal_info.full_name()
    }

    /// Business name, trimmed.
    #[must_use]
    pub fn business_name(&self) -> &str {
        self.business_info.business_name.trim()
    }
}

/// One page of applications plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPage {
    pub applications: Vec<ApplicationRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl ApplicationPage {
    /// Assemble a page, computing `total_pages`.
    #[must_use]
    pub fn new(applications: Vec<ApplicationRecord>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            applications,
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jane_doe() -> Value {
        json!({
            "personalInfo": {"firstName": "Jane", "lastName": "Doe", "email": "jane@x.com", "ssnLast4": "1234"},
            "businessInfo": {"businessName": "Acme", "yearsInBusiness": 4},
            "loanInfo": {"loanType": "Business", "loanAmount": 50000, "termMonths": 36},
            "signature": "data:image/png;base64,iVBORw0KGgo="
        })
    }

    #[test]
    fn test_submission_keeps_unknown_fields() {
        let submission: ApplicationSubmission = serde_json::from_value(jane_doe()).unwrap();
        assert_eq!(submission.personal_info.first_name, "Jane");
        assert_eq!(submission.personal_info.extra["ssnLast4"], "1234");
        assert_eq!(submission.business_info.extra["yearsInBusiness"], 4);

        match &submission.loan_info {
            LoanInfo::Business(loan) => {
                assert_eq!(loan.loan_amount, Some(Decimal::from(50_000)));
                assert_eq!(loan.extra["termMonths"], 36);
            }
            LoanInfo::Equipment(_) => panic!("expected business loan"),
        }
    }

    #[test]
    fn test_equipment_loan_variant() {
        let submission: ApplicationSubmission = serde_json::from_value(json!({
            "personalInfo": {"firstName": "Sam", "lastName": "Lee"},
            "loanInfo": {"loanType": "Equipment", "equipmentCost": "125000.50", "vendorName": "Cat"}
        }))
        .unwrap();

        assert_eq!(submission.loan_info.label(), "Equipment");
        let LoanInfo::Equipment(loan) = submission.loan_info else {
            panic!("expected equipment loan");
        };
        assert_eq!(loan.equipment_cost, Some("125000.50".parse().unwrap()));
        assert_eq!(loan.vendor_name.as_deref(), Some("Cat"));
    }

    #[test]
    fn test_unknown_loan_type_is_rejected() {
        let result = serde_json::from_value::<ApplicationSubmission>(json!({
            "personalInfo": {"firstName": "Sam", "lastName": "Lee"},
            "loanInfo": {"loanType": "Mortgage"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_record_serialises_with_id_and_status() {
        let submission: ApplicationSubmission = serde_json::from_value(jane_doe()).unwrap();
        let now = Utc::now();
        let record =
            ApplicationRecord::from_submission(ApplicationId::parse("123456").unwrap(), submission, now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "123456");
        assert_eq!(json["status"], "submitted");
        assert_eq!(json["loanInfo"]["loanType"], "Business");
        assert_eq!(json["personalInfo"]["ssnLast4"], "1234");

        let back: ApplicationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(ApplicationPage::new(vec![], 1, 20, 0).total_pages, 0);
        assert_eq!(ApplicationPage::new(vec![], 1, 20, 20).total_pages, 1);
        assert_eq!(ApplicationPage::new(vec![], 1, 20, 21).total_pages, 2);
    }
}
