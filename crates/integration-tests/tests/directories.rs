//! Recipient and admin directories, including owner protection.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use bluelender_core::Permissions;
use bluelender_integration_tests::{OWNER_EMAIL, PASSWORD, TestApp};

fn find<'a>(list: &'a Value, email: &str) -> &'a Value {
    list.as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["email"] == email)
        .unwrap()
}

// =============================================================================
// Recipients
// =============================================================================

#[tokio::test]
async fn test_recipient_crud() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (status, body) = app
        .post(
            "/admin/email-recipients",
            json!({ "name": "Underwriting", "email": "underwriting@bluelender.com" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["recipient"]["active"], true);
    let id = body["recipient"]["id"].clone();

    let (status, body) = app
        .put(
            "/admin/email-recipients",
            json!({ "id": id, "active": false, "name": "Underwriting Team" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["recipient"]["active"], false);
    assert_eq!(body["recipient"]["name"], "Underwriting Team");

    let (status, body) = app
        .post(
            "/admin/email-recipients",
            json!({ "name": "Dup", "email": "underwriting@bluelender.com" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _) = app
        .delete(&format!("/admin/email-recipients?id={id}"), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/admin/email-recipients", Some(&cookie)).await;
    assert!(body["recipients"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_owner_recipient_is_protected() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (status, body) = app
        .post(
            "/admin/email-recipients",
            json!({ "name": "Owner", "email": OWNER_EMAIL, "active": false }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["recipient"]["active"], true);
    assert_eq!(body["recipient"]["isMainAdmin"], true);
    let id = body["recipient"]["id"].clone();

    let (status, body) = app
        .delete(&format!("/admin/email-recipients?id={id}"), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = app.get("/admin/email-recipients", Some(&cookie)).await;
    assert_eq!(find(&body["recipients"], OWNER_EMAIL)["active"], true);
}

#[tokio::test]
async fn test_invalid_recipient_email_is_bad_request() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (status, _) = app
        .post(
            "/admin/email-recipients",
            json!({ "name": "Broken", "email": "not-an-address" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Admin accounts
// =============================================================================

#[tokio::test]
async fn test_admin_crud_strips_password_hash() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;
    let (_, session) = app.get("/admin/session", Some(&cookie)).await;
    let owner_id = session["admin"]["id"].clone();

    let (status, body) = app
        .post(
            "/admin/manage-admins",
            json!({
                "username": "reviewer",
                "email": "reviewer@bluelender.com",
                "password": PASSWORD,
                "permissions": { "viewApplications": true }
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["admin"]["role"], "sub-admin");
    assert_eq!(body["admin"]["addedBy"], owner_id);
    assert!(body["admin"].get("passwordHash").is_none());

    let (status, body) = app.get("/admin/manage-admins", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let admins = body["admins"].as_array().unwrap();
    assert_eq!(admins.len(), 2);
    assert!(admins.iter().all(|a| a.get("passwordHash").is_none()));

    let reviewer_cookie = app.login("reviewer@bluelender.com").await;
    let (status, _) = app.get("/admin/applications", Some(&reviewer_cookie)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_owner_admin_cannot_be_deleted_or_demoted() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (_, body) = app.get("/admin/manage-admins", Some(&cookie)).await;
    let owner = find(&body["admins"], OWNER_EMAIL);
    assert_eq!(owner["role"], "admin");
    assert_eq!(owner["permissions"]["manageAdmins"], true);
    let owner_id = owner["id"].clone();

    let (status, body) = app
        .delete(&format!("/admin/manage-admins?id={owner_id}"), Some(&cookie))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot delete the main admin account");

    let (status, _) = app
        .put(
            "/admin/manage-admins",
            json!({ "id": owner_id, "permissions": { "viewApplications": true } }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/admin/manage-admins", Some(&cookie)).await;
    let owner = find(&body["admins"], OWNER_EMAIL);
    assert_eq!(owner["permissions"]["manageSmtp"], true);
}

#[tokio::test]
async fn test_owner_created_by_another_admin_still_gets_full_permissions() {
    let app = TestApp::new();
    let cookie = app
        .login_with(
            "manager@bluelender.com",
            Permissions {
                manage_admins: true,
                ..Permissions::NONE
            },
        )
        .await;

    let (status, body) = app
        .post(
            "/admin/manage-admins",
            json!({
                "username": "owner",
                "email": OWNER_EMAIL,
                "password": "owner-password",
                "role": "sub-admin",
                "permissions": { "viewApplications": false }
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["admin"]["role"], "admin");
    assert_eq!(body["admin"]["permissions"]["manageRecipients"], true);
}

#[tokio::test]
async fn test_non_owner_cannot_receive_every_permission() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (status, body) = app
        .post(
            "/admin/manage-admins",
            json!({
                "username": "too-powerful",
                "email": "power@bluelender.com",
                "password": "power-password",
                "permissions": {
                    "viewApplications": true,
                    "manageAdmins": true,
                    "manageSmtp": true,
                    "manageRecipients": true
                }
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_duplicate_admin_email_conflicts() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;
    let account = json!({
        "username": "reviewer",
        "email": "reviewer@bluelender.com",
        "password": "reviewer-password"
    });

    let (status, _) = app.post("/admin/manage-admins", account.clone(), Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/admin/manage-admins", account, Some(&cookie)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "reviewer@bluelender.com is already in use");
}

#[tokio::test]
async fn test_smtp_config_hides_password() {
    let app = TestApp::new();
    let cookie = app.login_as_owner().await;

    let (status, body) = app.get("/admin/smtp-config", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["host"], "smtp.bluelender.test");
    assert_eq!(body["config"]["port"], 587);
    assert_eq!(body["config"]["secure"], false);
    assert!(!body.to_string().contains("smtp-password-not-used"));
}
