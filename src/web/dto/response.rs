//! Response DTOs for Web API.

use serde::Serialize;

use crate::db::User;
use crate::document::{Document, ProgressState};
use crate::pool::{RevalidationReport, StorageAccount};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
}

/// Stored user as returned by `/api/auth/session` and `/api/auth/me`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// Document details.
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: i64,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub owner_id: String,
    pub checksum: String,
    pub uploaded_at: String,
    /// Authenticated download path on this server.
    pub content_url: String,
    /// Read ACL; only present for the owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<Vec<String>>,
}

impl DocumentResponse {
    /// Build the response as seen by `viewer_id`.
    pub fn for_viewer(doc: Document, viewer_id: &str) -> Self {
        let shared_with = (doc.owner_id == viewer_id).then_some(doc.shared_with);
        Self {
            content_url: format!("/api/documents/{}/content", doc.id),
            id: doc.id,
            name: doc.name,
            mime_type: doc.mime_type,
            size_bytes: doc.size_bytes,
            owner_id: doc.owner_id,
            checksum: doc.checksum,
            uploaded_at: doc.uploaded_at,
            shared_with,
        }
    }
}

/// Read ACL of a document.
#[derive(Debug, Serialize)]
pub struct SharesResponse {
    pub document_id: i64,
    pub shared_with: Vec<String>,
}

/// Storage account as shown to administrators. Credentials never leave the server.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub owner_email: String,
    pub is_active: bool,
    pub has_refresh_credential: bool,
    pub used_capacity_bytes: i64,
    pub total_capacity_bytes: i64,
    pub reserved_bytes: i64,
    pub free_bytes: u64,
    pub added_at: String,
    pub last_checked_at: String,
}

impl From<StorageAccount> for AccountResponse {
    fn from(account: StorageAccount) -> Self {
        Self {
            free_bytes: account.free_bytes(),
            has_refresh_credential: account.refresh_credential.is_some(),
            id: account.id,
            owner_email: account.owner_email,
            is_active: account.is_active,
            used_capacity_bytes: account.used_capacity_bytes,
            total_capacity_bytes: account.total_capacity_bytes,
            reserved_bytes: account.reserved_bytes,
            added_at: account.added_at,
            last_checked_at: account.last_checked_at,
        }
    }
}

/// Latest state of a tracked upload.
#[derive(Debug, Serialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    #[serde(flatten)]
    pub progress: ProgressState,
}

/// Result of `POST /api/admin/accounts/revalidate`.
#[derive(Debug, Serialize)]
pub struct RevalidationResponse {
    pub checked: usize,
    pub deactivated: Vec<i64>,
    pub refreshed: usize,
}

impl From<RevalidationReport> for RevalidationResponse {
    fn from(report: RevalidationReport) -> Self {
        Self {
            checked: report.checked,
            deactivated: report.deactivated,
            refreshed: report.refreshed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;

    fn document() -> Document {
        Document {
            id: 7,
            name: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            size_bytes: 10,
            owner_id: "owner".into(),
            account_id: 1,
            storage_path: "ab/x.pdf".into(),
            download_url: "local://1/ab/x.pdf".into(),
            checksum: "00".into(),
            uploaded_at: "2024-01-01 00:00:00".into(),
            shared_with: vec!["bob@example.com".into()],
        }
    }

    #[test]
    fn test_api_response_serialization() {
        let json = serde_json::to_value(ApiResponse::new("hello")).unwrap();
        assert_eq!(json["data"], "hello");
    }

    #[test]
    fn test_paginated_response() {
        let response = PaginatedResponse::new(vec![1, 2], 2, 10, 12);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["meta"]["page"], 2);
        assert_eq!(json["meta"]["total"], 12);
    }

    #[test]
    fn test_document_response_hides_acl_from_readers() {
        let owner_view = serde_json::to_value(DocumentResponse::for_viewer(document(), "owner")).unwrap();
        assert_eq!(owner_view["shared_with"][0], "bob@example.com");
        assert_eq!(owner_view["content_url"], "/api/documents/7/content");
        assert!(owner_view.get("storage_path").is_none());

        let reader_view = serde_json::to_value(DocumentResponse::for_viewer(document(), "bob")).unwrap();
        assert!(reader_view.get("shared_with").is_none());
    }

    #[test]
    fn test_account_response_omits_credentials() {
        let account = StorageAccount {
            id: 3,
            owner_email: "drive@example.com".into(),
            access_credential: "secret-access".into(),
            refresh_credential: Some("secret-refresh".into()),
            is_active: true,
            used_capacity_bytes: 40,
            total_capacity_bytes: 100,
            reserved_bytes: 10,
            added_at: "t".into(),
            last_checked_at: "t".into(),
        };

        let json = serde_json::to_string(&AccountResponse::from(account)).unwrap();
        assert!(!json.contains("secret"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["free_bytes"], 50);
        assert_eq!(value["has_refresh_credential"], true);
    }

    #[test]
    fn test_user_response_role() {
        let user = User {
            id: "u1".into(),
            email: "admin@example.com".into(),
            display_name: "Admin".into(),
            role: Role::Admin,
            created_at: "t".into(),
            last_login: None,
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["role"], "admin");
        assert!(json.get("last_login").is_none());
    }

    #[test]
    fn test_upload_status_serialization() {
        let response = UploadStatusResponse {
            upload_id: "u1".into(),
            progress: ProgressState::InProgress { percent: 40 },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["upload_id"], "u1");
        assert_eq!(json["state"], "in_progress");
        assert_eq!(json["percent"], 40);
    }
}
