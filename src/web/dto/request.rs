//! Request DTOs for Web API.

use serde::Deserialize;
use validator::Validate;

use super::validation::{no_control_chars, not_empty_trimmed, upload_id_chars};
use crate::document::{ListScope, Page};
use crate::pool::AccountUpdate;

/// Default page size.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Maximum page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Query parameters for `GET /api/documents`.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    /// `owned` (default) or `shared`.
    #[serde(default)]
    pub scope: ListScope,
    /// Page number, starting at 1.
    pub page: Option<u32>,
    /// Items per page.
    pub per_page: Option<u32>,
}

impl DocumentListQuery {
    /// Page number, at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to 1..=100.
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Offset/limit window for the repository.
    pub fn window(&self) -> Page {
        let per_page = i64::from(self.per_page());
        Page::new((i64::from(self.page()) - 1) * per_page, per_page)
    }
}

/// Query parameters for `POST /api/documents`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UploadQuery {
    /// Client-chosen ID under which progress can be polled.
    #[validate(
        length(min = 1, max = 64, message = "Must be 1-64 characters"),
        custom(function = "upload_id_chars")
    )]
    pub upload_id: Option<String>,
}

/// Share or unshare request.
#[derive(Debug, Deserialize, Validate)]
pub struct ShareRequest {
    /// Email to grant read access to.
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Add a storage account to the pool.
#[derive(Debug, Deserialize, Validate)]
pub struct AddAccountRequest {
    /// Email of the Google account.
    #[validate(email(message = "Invalid email format"))]
    pub owner_email: String,
    /// OAuth access token.
    #[validate(
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub access_credential: String,
    /// OAuth refresh token.
    #[serde(default)]
    pub refresh_credential: Option<String>,
}

/// Partial update of a storage account.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    /// New owner email.
    #[validate(email(message = "Invalid email format"))]
    pub owner_email: Option<String>,
    /// New access token; validated against the provider.
    #[validate(custom(function = "not_empty_trimmed"))]
    pub access_credential: Option<String>,
    /// New refresh token.
    pub refresh_credential: Option<String>,
    /// Activity state.
    pub is_active: Option<bool>,
    /// Used capacity in bytes.
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub used_capacity_bytes: Option<i64>,
    /// Total capacity in bytes.
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub total_capacity_bytes: Option<i64>,
}

impl From<UpdateAccountRequest> for AccountUpdate {
    fn from(req: UpdateAccountRequest) -> Self {
        AccountUpdate {
            owner_email: req.owner_email,
            access_credential: req.access_credential,
            refresh_credential: req.refresh_credential.map(Some),
            is_active: req.is_active,
            used_capacity_bytes: req.used_capacity_bytes,
            total_capacity_bytes: req.total_capacity_bytes,
        }
    }
}
