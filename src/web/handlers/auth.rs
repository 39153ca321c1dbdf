//! Authentication handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{ApiResponse, UserResponse};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, CurrentUser};

/// POST /api/auth/session - Record an authentication event.
///
/// Creates the user on first sight and recomputes the role from the admin
/// allowlist every time.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.identity.resolve(&claims.principal()).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "Session opened");
    Ok(Json(ApiResponse::new(user.into())))
}

/// GET /api/auth/me - Current stored user.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::new(user.into()))
}
