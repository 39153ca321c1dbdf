//! Web API authentication tests.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use common::{bearer, token, TestApp, ADMIN_EMAIL};
use serde_json::Value;

#[tokio::test]
async fn test_health() {
    let server = axum_test::TestServer::new(docpool::web::create_health_router()).unwrap();
    server.get("/health").await.assert_text("OK");
}

#[tokio::test]
async fn test_session_creates_user() {
    let app = TestApp::new().await;
    let token = token("google|alice", "Alice@Example.com");

    let response = app
        .server
        .post("/api/auth/session")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["id"], "google|alice");
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["display_name"], "alice@example.com");
}

#[tokio::test]
async fn test_admin_email_gets_admin_role() {
    let app = TestApp::new().await;
    let token = app.login("google|admin", ADMIN_EMAIL).await;

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["role"], "admin");
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_me_requires_session() {
    let app = TestApp::new().await;
    let token = token("google|bob", "bob@example.com");

    app.server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.login("google|bob", "bob@example.com").await;

    app.server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = TestApp::new().await;

    app.server
        .post("/api/auth/session")
        .add_header(AUTHORIZATION, "Bearer not.a.jwt".to_string())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_reclassified_on_next_session() {
    let app = TestApp::new().await;
    let token = app.login("google|carol", "carol@example.com").await;

    // Same subject, now presenting the admin email.
    let admin_token = common::token("google|carol", ADMIN_EMAIL);
    let response = app
        .server
        .post("/api/auth/session")
        .add_header(AUTHORIZATION, bearer(&admin_token))
        .await;
    assert_eq!(response.json::<Value>()["data"]["role"], "admin");

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_eq!(response.json::<Value>()["data"]["role"], "admin");
}
