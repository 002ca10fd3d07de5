//! Submission endpoint: persistence, PDFs, and best-effort notifications.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use bluelender_core::{ApplicationId, ApplicationStatus};
use bluelender_integration_tests::{
    BrokenRenderer, FailingNotifier, OWNER_EMAIL, OfflineApplicationStore, RecordingNotifier, TestApp,
    jane_doe_form,
};
use bluelender_server::db::ApplicationStore;
use bluelender_server::services::PdfRenderer;
use bluelender_server::services::email::Recipients;

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_jane_doe_end_to_end() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder()
        .notifier(notifier.clone())
        .renderer(Arc::new(PdfRenderer::new("Blue Lender")))
        .build();

    let (status, body) = app.post("/application/submit", jane_doe_form(), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let id = body["id"].as_str().unwrap();
    assert_eq!(id.len(), 6);
    let numeric: u32 = id.parse().unwrap();
    assert!((100_000..=999_999).contains(&numeric));

    let stored = app
        .applications
        .get(&ApplicationId::parse(id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert_eq!(stored.applicant_name(), "Jane Doe");

    let sent = notifier.wait_for(2).await;
    assert_eq!(sent.len(), 2);

    let admin = &sent[0];
    assert_eq!(admin.to, Recipients::Many(vec![OWNER_EMAIL.to_owned()]));
    assert_eq!(
        admin.subject,
        "New Business Loan Application - Doe Bakery LLC"
    );
    assert_eq!(admin.attachments.len(), 1);
    assert_eq!(admin.attachments[0].content_type, "application/pdf");
    assert!(admin.attachments[0].content.starts_with(b"%PDF-"));

    let applicant = &sent[1];
    assert_eq!(applicant.to, Recipients::One("jane@example.com".to_owned()));
    assert!(applicant.subject.contains(id));
    assert_eq!(applicant.attachments.len(), 1);
    assert!(applicant.attachments[0].content.starts_with(b"%PDF-"));
    assert_ne!(admin.attachments[0].filename, applicant.attachments[0].filename);
}

#[tokio::test]
async fn test_active_recipients_receive_admin_email() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();
    let cookie = app.login_as_owner().await;

    for (name, email, active) in [
        ("Underwriting", "underwriting@bluelender.com", true),
        ("Archive", "archive@bluelender.com", false),
    ] {
        let (status, _) = app
            .post(
                "/admin/email-recipients",
                json!({ "name": name, "email": email, "active": active }),
                Some(&cookie),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app.post("/application/submit", jane_doe_form(), None).await;
    assert_eq!(status, StatusCode::OK);

    let sent = notifier.wait_for(2).await;
    assert_eq!(
        sent[0].to,
        Recipients::Many(vec![
            OWNER_EMAIL.to_owned(),
            "underwriting@bluelender.com".to_owned(),
        ])
    );
}

#[tokio::test]
async fn test_no_applicant_email_sends_admin_only() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();

    let mut form = jane_doe_form();
    form["personalInfo"].as_object_mut().unwrap().remove("email");

    let (status, _) = app.post("/application/submit", form, None).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(notifier.wait_for(1).await.len(), 1);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(notifier.sent.lock().await.len(), 1);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_email_failure_still_returns_id_and_queues() {
    let notifier = Arc::new(FailingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();

    let (status, body) = app.post("/application/submit", jane_doe_form(), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);

    let id = ApplicationId::parse(body["id"].as_str().unwrap()).unwrap();
    assert!(app.applications.get(&id).await.unwrap().is_some());

    assert_eq!(app.wait_for_queue(2).await, 2);
    let queued = app.failed_emails.all().await;
    assert!(queued.iter().all(|e| e.application_id.as_ref() == Some(&id)));
    assert!(queued.iter().all(|e| e.attachments.len() == 1));
    assert_eq!(*notifier.calls.lock().await, 2);
}

#[tokio::test]
async fn test_persistence_failure_reports_error_and_sends_nothing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder()
        .notifier(notifier.clone())
        .application_store(Arc::new(OfflineApplicationStore))
        .build();

    let (status, body) = app.post("/application/submit", jane_doe_form(), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to submit application"), "{error}");
    assert!(error.contains("connection refused"), "{error}");
    assert!(body.get("id").is_none());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(notifier.sent.lock().await.is_empty());
    assert!(app.failed_emails.all().await.is_empty());
}

#[tokio::test]
async fn test_render_failure_reports_error_and_sends_nothing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder()
        .notifier(notifier.clone())
        .renderer(Arc::new(BrokenRenderer))
        .build();

    let (status, body) = app.post("/application/submit", jane_doe_form(), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Failed to submit application"), "{error}");
    assert!(error.contains("font table missing"), "{error}");
    assert!(body.get("id").is_none());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(notifier.sent.lock().await.is_empty());
    assert!(app.failed_emails.all().await.is_empty());
}

#[tokio::test]
async fn test_validation_errors_are_bad_requests() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();

    let mut form = jane_doe_form();
    form["businessInfo"]["businessName"] = json!("  ");

    let (status, body) = app.post("/application/submit", form, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Business name is required");
    assert!(app.applications.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/application/submit", json!({ "personalInfo": "nope" }), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_resubmission_creates_new_record() {
    let app = TestApp::new();

    let (_, first) = app.post("/application/submit", jane_doe_form(), None).await;
    let (_, second) = app.post("/application/submit", jane_doe_form(), None).await;

    assert_ne!(first["id"], second["id"]);
    assert_eq!(app.applications.len().await, 2);
}
