//! Application administration: listing, status changes, and deletion.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use serde_json::json;

use bluelender_core::{ApplicationId, ApplicationStatus, Permissions};
use bluelender_integration_tests::{RecordingNotifier, TestApp};
use bluelender_server::db::ApplicationStore;
use bluelender_server::models::{ApplicationRecord, ApplicationSubmission};
use bluelender_server::services::email::Recipients;

fn reviewer() -> Permissions {
    Permissions {
        view_applications: true,
        ..Permissions::NONE
    }
}

/// Store a submitted record directly, bypassing submission emails.
async fn seed(app: &TestApp, id: &str, minute: u32) -> ApplicationId {
    let submission: ApplicationSubmission =
        serde_json::from_value(bluelender_integration_tests::jane_doe_form()).unwrap();
    let id = ApplicationId::parse(id).unwrap();
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap();
    let record = ApplicationRecord::from_submission(id.clone(), submission, at);
    app.applications.save(&record).await.unwrap();
    id
}

// =============================================================================
// Status updates
// =============================================================================

#[tokio::test]
async fn test_approval_sends_one_status_email() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();
    let id = seed(&app, "482913", 0).await;
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, body) = app
        .put(
            "/admin/applications",
            json!({ "id": id.as_str(), "status": "approved", "notes": "Strong financials" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["application"]["status"], "approved");
    assert_eq!(body["application"]["notes"], "Strong financials");

    let sent = notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Recipients::One("jane@example.com".to_owned()));
    assert!(sent[0].subject.starts_with("Your Loan Application Has Been Approved"));
    assert!(sent[0].attachments.is_empty());

    // Same status again: stored, but no second email
    let (status, _) = app
        .put(
            "/admin/applications",
            json!({ "id": id.as_str(), "status": "approved" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(notifier.sent.lock().await.len(), 1);

    let stored = app.applications.get(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, ApplicationStatus::Approved);
    assert_eq!(stored.notes.as_deref(), Some("Strong financials"));
}

#[tokio::test]
async fn test_non_notifying_status_sends_nothing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = TestApp::builder().notifier(notifier.clone()).build();
    let id = seed(&app, "482913", 0).await;
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, _) = app
        .put(
            "/admin/applications",
            json!({ "id": id.as_str(), "status": "draft" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(notifier.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_unknown_status_is_bad_request() {
    let app = TestApp::new();
    let id = seed(&app, "482913", 0).await;
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, body) = app
        .put(
            "/admin/applications",
            json!({ "id": id.as_str(), "status": "funded" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid status"));
}

#[tokio::test]
async fn test_status_update_for_missing_application_is_not_found() {
    let app = TestApp::new();
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, body) = app
        .put(
            "/admin/applications",
            json!({ "id": "777777", "status": "in-review" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_is_newest_first_with_pagination() {
    let app = TestApp::new();
    seed(&app, "100001", 0).await;
    seed(&app, "100002", 1).await;
    seed(&app, "100003", 2).await;
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, body) = app
        .get("/admin/applications?page=1&limit=2", Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let ids: Vec<&str> = body["applications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["100003", "100002"]);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);

    let (_, body) = app
        .get("/admin/applications?page=2&limit=2", Some(&cookie))
        .await;
    assert_eq!(body["applications"][0]["id"], "100001");
}

#[tokio::test]
async fn test_get_by_id() {
    let app = TestApp::new();
    let id = seed(&app, "482913", 0).await;
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, body) = app
        .get(&format!("/admin/applications?id={id}"), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["personalInfo"]["firstName"], "Jane");

    let (status, _) = app.get("/admin/applications?id=555555", Some(&cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/admin/applications?id=abc", Some(&cookie)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_page_zero_is_bad_request() {
    let app = TestApp::new();
    let cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;

    let (status, _) = app.get("/admin/applications?page=0", Some(&cookie)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_requires_owner() {
    let app = TestApp::new();
    let id = seed(&app, "482913", 0).await;

    let reviewer_cookie = app.login_with("reviewer@bluelender.com", reviewer()).await;
    let (status, body) = app
        .delete(&format!("/admin/applications?id={id}"), Some(&reviewer_cookie))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only the main admin can perform this action");
    assert!(app.applications.get(&id).await.unwrap().is_some());

    let owner_cookie = app.login_as_owner().await;
    let (status, _) = app
        .delete(&format!("/admin/applications?id={id}"), Some(&owner_cookie))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.applications.get(&id).await.unwrap().is_none());

    let (status, _) = app
        .delete(&format!("/admin/applications?id={id}"), Some(&owner_cookie))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
