//! Storage account administration handlers.
//!
//! Every handler requires a stored user with the admin role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::web::dto::{
    AccountResponse, AddAccountRequest, ApiResponse, RevalidationResponse, UpdateAccountRequest,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AdminUser;

/// GET /api/admin/accounts - List all storage accounts.
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<Vec<AccountResponse>>>, ApiError> {
    let accounts = state.pool.list_accounts().await?;
    Ok(Json(ApiResponse::new(
        accounts.into_iter().map(AccountResponse::from).collect(),
    )))
}

/// POST /api/admin/accounts - Add an account after validating its credential.
pub async fn add_account(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidatedJson(req): ValidatedJson<AddAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ApiError> {
    let id = state
        .pool
        .add_account(
            &req.owner_email,
            &req.access_credential,
            req.refresh_credential.as_deref(),
        )
        .await?;
    tracing::info!(account_id = id, admin = %admin.id, "Admin added storage account");

    let account = state.pool.get_account(id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(account.into()))))
}

/// GET /api/admin/accounts/:id - Account details.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let account = state.pool.get_account(id).await?;
    Ok(Json(ApiResponse::new(account.into())))
}

/// PATCH /api/admin/accounts/:id - Partial update.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let account = state.pool.update_account(id, req.into()).await?;
    Ok(Json(ApiResponse::new(account.into())))
}

/// DELETE /api/admin/accounts/:id - Remove an account holding no documents.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.pool.delete_account(id).await?;
    tracing::info!(account_id = id, admin = %admin.id, "Admin deleted storage account");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/accounts/:id/deactivate - Stop placing uploads on an account.
pub async fn deactivate_account(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    let account = state.pool.deactivate_account(id).await?;
    Ok(Json(ApiResponse::new(account.into())))
}

/// POST /api/admin/accounts/revalidate - Re-check every active account.
pub async fn revalidate_accounts(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<RevalidationResponse>>, ApiError> {
    let report = state.pool.revalidate_all().await?;
    Ok(Json(ApiResponse::new(report.into())))
}
