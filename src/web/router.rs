//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_account, add_share, create_session, deactivate_account, delete_account, delete_document,
    download_document, get_account, get_document, list_accounts, list_documents, list_shares, me,
    remove_share, revalidate_accounts, update_account, upload_document, upload_status, AppState,
};
use super::middleware::{create_cors_layer, jwt_auth, JwtState};

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
    max_upload_bytes: u64,
) -> Router {
    let auth_routes = Router::new()
        .route("/session", post(create_session))
        .route("/me", get(me));

    let document_routes = Router::new()
        .route("/", get(list_documents).post(upload_document))
        .route("/:id", get(get_document).delete(delete_document))
        .route("/:id/content", get(download_document))
        .route("/:id/shares", get(list_shares).post(add_share))
        .route("/:id/shares/:email", delete(remove_share));

    let upload_routes = Router::new().route("/:upload_id", get(upload_status));

    let admin_routes = Router::new()
        .route("/accounts", get(list_accounts).post(add_account))
        .route("/accounts/revalidate", post(revalidate_accounts))
        .route(
            "/accounts/:id",
            get(get_account)
                .patch(update_account)
                .delete(delete_account),
        )
        .route("/accounts/:id/deactivate", post(deactivate_account));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/documents", document_routes)
        .nest("/uploads", upload_routes)
        .nest("/admin", admin_routes);

    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
