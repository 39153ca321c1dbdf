//! Test helpers for Web API integration tests.
//!
//! Builds the real router over an in-memory database, a local byte store in
//! a temp directory, a credential validator that accepts any token starting
//! with `valid`, and a fixed quota.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tempfile::TempDir;

use docpool::auth::{AdminPolicy, IdentityResolver};
use docpool::document::{DocumentService, LocalByteStore};
use docpool::pool::{AccountPool, CredentialValidator, FixedCapacityProbe};
use docpool::web::middleware::{JwtClaims, JwtState};
use docpool::web::router::create_router;
use docpool::web::AppState;
use docpool::Database;

pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ACCOUNT_CAPACITY: u64 = 1024;
pub const MAX_UPLOAD_BYTES: u64 = 4096;

/// Accepts credentials starting with `valid`.
pub struct StaticValidator;

#[async_trait]
impl CredentialValidator for StaticValidator {
    async fn validate(&self, access_credential: &str) -> bool {
        access_credential.starts_with("valid")
    }
}

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    _dir: TempDir,
}

impl TestApp {
    /// Create an app with no storage accounts.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");

        let pool = Arc::new(AccountPool::new(
            db.clone(),
            Arc::new(StaticValidator),
            Arc::new(FixedCapacityProbe::new(ACCOUNT_CAPACITY)),
        ));
        let store = LocalByteStore::new(dir.path().join("files"))
            .expect("Failed to create byte store")
            .with_chunk_size(64);
        let documents = Arc::new(
            DocumentService::new(db.clone(), pool.clone(), Arc::new(store))
                .with_max_upload_bytes(MAX_UPLOAD_BYTES),
        );
        let identity = IdentityResolver::new(db.clone(), AdminPolicy::new([ADMIN_EMAIL]));

        let state = Arc::new(AppState::new(db, identity, pool, documents));
        let jwt_state = Arc::new(JwtState::new(JWT_SECRET));
        let router = create_router(state.clone(), jwt_state, &[], MAX_UPLOAD_BYTES);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            state,
            _dir: dir,
        }
    }

    /// Create an app with one storage account.
    pub async fn with_account() -> Self {
        let app = Self::new().await;
        app.add_account("drive1@example.com").await;
        app
    }

    /// Add a storage account directly through the pool.
    pub async fn add_account(&self, email: &str) -> i64 {
        self.state
            .pool
            .add_account(email, "valid-token", None)
            .await
            .expect("Failed to add account")
    }

    /// Open a session and return the bearer token.
    pub async fn login(&self, sub: &str, email: &str) -> String {
        let token = token(sub, email);
        self.server
            .post("/api/auth/session")
            .add_header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .await
            .assert_status_ok();
        token
    }

    /// Upload `content` as `name` and return the response.
    pub async fn upload(&self, token: &str, name: &str, content: &[u8]) -> TestResponse {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(content.to_vec()).file_name(name.to_string()),
        );
        self.server
            .post("/api/documents")
            .add_header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .multipart(form)
            .await
    }

    /// Upload with progress tracked under `upload_id`.
    pub async fn upload_tracked(
        &self,
        token: &str,
        upload_id: &str,
        name: &str,
        content: &[u8],
    ) -> TestResponse {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(content.to_vec()).file_name(name.to_string()),
        );
        self.server
            .post("/api/documents")
            .add_query_param("upload_id", upload_id)
            .add_header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .multipart(form)
            .await
    }

    /// Latest progress of an upload.
    pub async fn upload_status(&self, token: &str, upload_id: &str) -> TestResponse {
        self.server
            .get(&format!("/api/uploads/{}", upload_id))
            .add_header(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {}", token),
            )
            .await
    }

    /// Upload and return the new document's ID.
    pub async fn upload_ok(&self, token: &str, name: &str, content: &[u8]) -> i64 {
        let response = self.upload(token, name, content).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"]["id"]
            .as_i64()
            .expect("document id")
    }
}

/// Mint an identity-provider token.
pub fn token(sub: &str, email: &str) -> String {
    let claims = JwtClaims {
        sub: sub.to_string(),
        email: email.to_string(),
        name: String::new(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

/// `Bearer <token>` header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
