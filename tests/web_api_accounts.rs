//! Web API storage account administration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use common::{bearer, TestApp, ACCOUNT_CAPACITY, ADMIN_EMAIL};
use serde_json::{json, Value};

async fn admin(app: &TestApp) -> String {
    app.login("admin", ADMIN_EMAIL).await
}

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let app = TestApp::new().await;
    let alice = app.login("alice", "alice@example.com").await;

    let response = app
        .server
        .get("/api/admin/accounts")
        .add_header(AUTHORIZATION, bearer(&alice))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    app.server
        .get("/api/admin/accounts")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_and_list_accounts() {
    let app = TestApp::new().await;
    let token = admin(&app).await;

    let response = app
        .server
        .post("/api/admin/accounts")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "owner_email": "Drive1@Example.com",
            "access_credential": "valid-access",
            "refresh_credential": "refresh-secret"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["data"]["owner_email"], "drive1@example.com");
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["has_refresh_credential"], true);
    assert_eq!(body["data"]["total_capacity_bytes"], ACCOUNT_CAPACITY);
    assert_eq!(body["data"]["free_bytes"], ACCOUNT_CAPACITY);
    assert!(!response.text().contains("valid-access"));
    assert!(!response.text().contains("refresh-secret"));

    let response = app
        .server
        .get("/api/admin/accounts")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_account_with_rejected_credential() {
    let app = TestApp::new().await;
    let token = admin(&app).await;

    let response = app
        .server
        .post("/api/admin/accounts")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "owner_email": "drive1@example.com",
            "access_credential": "expired-token"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "INVALID_CREDENTIAL");

    assert!(app.state.pool.list_accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_account_validation() {
    let app = TestApp::new().await;
    let token = admin(&app).await;

    let response = app
        .server
        .post("/api/admin/accounts")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "owner_email": "nope",
            "access_credential": ""
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let details = &response.json::<Value>()["error"]["details"];
    assert!(details["owner_email"].is_array());
    assert!(details["access_credential"].is_array());
}

#[tokio::test]
async fn test_update_account() {
    let app = TestApp::new().await;
    let id = app.add_account("drive1@example.com").await;
    let token = admin(&app).await;

    let response = app
        .server
        .patch(&format!("/api/admin/accounts/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "total_capacity_bytes": 5000, "used_capacity_bytes": 1000 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["free_bytes"], 4000);

    app.server
        .patch(&format!("/api/admin/accounts/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "access_credential": "revoked" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .patch("/api/admin/accounts/999")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "is_active": false }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivated_account_takes_no_uploads() {
    let app = TestApp::new().await;
    let id = app.add_account("drive1@example.com").await;
    let token = admin(&app).await;
    let alice = app.login("alice", "alice@example.com").await;
    let doc = app.upload_ok(&alice, "before.txt", b"kept").await;

    let response = app
        .server
        .post(&format!("/api/admin/accounts/{}/deactivate", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["is_active"], false);

    app.upload(&alice, "after.txt", b"x")
        .await
        .assert_status(StatusCode::INSUFFICIENT_STORAGE);

    // Existing documents stay readable.
    let response = app
        .server
        .get(&format!("/api/documents/{}/content", doc))
        .add_header(AUTHORIZATION, bearer(&alice))
        .await;
    assert_eq!(response.as_bytes().as_ref(), b"kept");
}

#[tokio::test]
async fn test_delete_account_blocked_while_referenced() {
    let app = TestApp::new().await;
    let id = app.add_account("drive1@example.com").await;
    let token = admin(&app).await;
    let alice = app.login("alice", "alice@example.com").await;
    let doc = app.upload_ok(&alice, "notes.txt", b"x").await;

    let response = app
        .server
        .delete(&format!("/api/admin/accounts/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    app.server
        .delete(&format!("/api/documents/{}", doc))
        .add_header(AUTHORIZATION, bearer(&alice))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .delete(&format!("/api/admin/accounts/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/admin/accounts/{}", id))
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_revalidate_deactivates_failing_accounts() {
    let app = TestApp::new().await;
    let good = app.add_account("drive1@example.com").await;
    let bad = app.add_account("drive2@example.com").await;
    let token = admin(&app).await;

    // Simulate a revoked token by swapping in one the validator rejects.
    sqlx::query("UPDATE storage_accounts SET access_credential = 'revoked' WHERE id = ?")
        .bind(bad)
        .execute(app.state.db.pool())
        .await
        .unwrap();

    let response = app
        .server
        .post("/api/admin/accounts/revalidate")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["checked"], 2);
    assert_eq!(body["data"]["deactivated"], json!([bad]));
    assert_eq!(body["data"]["refreshed"], 1);

    assert!(app.state.pool.get_account(good).await.unwrap().is_active);
    assert!(!app.state.pool.get_account(bad).await.unwrap().is_active);
}
