//! Document handlers.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::document::{cancellation, progress_channel, CancelHandle, UploadRequest};
use validator::Validate;

use crate::web::dto::{
    ApiResponse, DocumentListQuery, DocumentResponse, PaginatedResponse, ShareRequest,
    SharesResponse, UploadQuery, UploadStatusResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::CurrentUser;

/// Generate a safe Content-Disposition header value for downloads.
///
/// Control characters are stripped, quotes and backslashes replaced in the
/// ASCII fallback, and non-ASCII names are also sent RFC 5987 encoded.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(&sanitized)
    )
}

/// Cancels the upload if the request future is dropped before it finishes.
struct CancelOnDrop(Option<CancelHandle>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0.take();
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            tracing::info!("Client went away, cancelling upload");
            handle.cancel();
        }
    }
}

/// GET /api/documents - List owned or shared documents.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<PaginatedResponse<DocumentResponse>>, ApiError> {
    let documents = state
        .documents
        .list_page(&user, query.scope, query.window())
        .await?;
    let total = state.documents.count(&user, query.scope).await?;

    let data = documents
        .into_iter()
        .map(|doc| DocumentResponse::for_viewer(doc, &user.id))
        .collect();

    Ok(Json(PaginatedResponse::new(
        data,
        query.page(),
        query.per_page(),
        total.max(0) as u64,
    )))
}

/// POST /api/documents - Upload a document (multipart field `file`).
///
/// With `?upload_id=<id>` the upload's progress can be polled at
/// `GET /api/uploads/<id>` while this request is running.
///
/// The upload runs in its own task; if the client disconnects it is
/// cancelled at the next checkpoint and its reservation released.
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<DocumentResponse>>), ApiError> {
    query.validate().map_err(ApiError::from_validation_errors)?;

    let (reporter, receiver) = progress_channel();
    if let Some(ref upload_id) = query.upload_id {
        if !state.uploads.register(&user.id, upload_id, receiver).await {
            return Err(ApiError::conflict(format!(
                "Upload '{upload_id}' is already in progress"
            )));
        }
    }

    let mut filename: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                if mime_type.is_none() {
                    mime_type = field.content_type().map(|s| s.to_string());
                }
                let bytes = field.bytes().await.map_err(|e| {
                    tracing::debug!("Failed to read file content: {}", e);
                    ApiError::bad_request("Failed to read file")
                })?;
                content = Some(bytes.to_vec());
            }
            "mime_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid mime_type field"))?;
                if !text.trim().is_empty() {
                    mime_type = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;

    if content.len() as u64 > state.documents.max_upload_bytes() {
        return Err(ApiError::payload_too_large(format!(
            "File too large (max {} bytes)",
            state.documents.max_upload_bytes()
        )));
    }

    let mut request = UploadRequest::new(filename, content);
    if let Some(mime) = mime_type.filter(|m| m != "application/octet-stream") {
        request = request.with_mime_type(mime);
    }

    let (handle, cancel) = cancellation();
    let guard = CancelOnDrop(Some(handle));

    let documents = state.documents.clone();
    let owner = user.clone();
    let task = tokio::spawn(async move {
        documents.upload(request, &owner, &reporter, &cancel).await
    });

    let result = task.await.map_err(|e| {
        tracing::error!("Upload task failed: {}", e);
        ApiError::internal("Upload failed")
    })?;
    guard.disarm();

    let doc = result?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(DocumentResponse::for_viewer(doc, &user.id))),
    ))
}

/// GET /api/uploads/:upload_id - Latest progress of one of the caller's uploads.
pub async fn upload_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(upload_id): Path<String>,
) -> Result<Json<ApiResponse<UploadStatusResponse>>, ApiError> {
    let progress = state
        .uploads
        .status(&user.id, &upload_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Upload '{upload_id}' not found")))?;

    Ok(Json(ApiResponse::new(UploadStatusResponse {
        upload_id,
        progress,
    })))
}

/// GET /api/documents/:id - Document details.
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> Result<Json<ApiResponse<DocumentResponse>>, ApiError> {
    let doc = state.documents.get_for(document_id, &user).await?;
    Ok(Json(ApiResponse::new(DocumentResponse::for_viewer(
        doc, &user.id,
    ))))
}

/// GET /api/documents/:id/content - Download document bytes.
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let (doc, content) = state.documents.download(document_id, &user).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, &doc.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&doc.name),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// DELETE /api/documents/:id - Delete an owned document.
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.documents.delete(document_id, &user).await?;
    tracing::info!(document_id, user_id = %user.id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/documents/:id/shares - Read ACL of an owned document.
pub async fn list_shares(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> Result<Json<ApiResponse<SharesResponse>>, ApiError> {
    let shared_with = state.sharing.shared_with(document_id, &user).await?;
    Ok(Json(ApiResponse::new(SharesResponse {
        document_id,
        shared_with,
    })))
}

/// POST /api/documents/:id/shares - Grant read access.
pub async fn add_share(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ShareRequest>,
) -> Result<Json<ApiResponse<SharesResponse>>, ApiError> {
    let doc = state.sharing.share(document_id, &user, &req.email).await?;
    Ok(Json(ApiResponse::new(SharesResponse {
        document_id,
        shared_with: doc.shared_with,
    })))
}

/// DELETE /api/documents/:id/shares/:email - Revoke read access.
pub async fn remove_share(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((document_id, email)): Path<(i64, String)>,
) -> Result<Json<ApiResponse<SharesResponse>>, ApiError> {
    let doc = state.sharing.unshare(document_id, &user, &email).await?;
    Ok(Json(ApiResponse::new(SharesResponse {
        document_id,
        shared_with: doc.shared_with,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_simple_ascii() {
        assert_eq!(
            content_disposition_header("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let result = content_disposition_header("résumé.txt");
        assert!(result.contains("filename=\"résumé.txt\""));
        assert!(result.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.txt"));
    }

    #[test]
    fn test_content_disposition_header_injection() {
        let result = content_disposition_header("file\"\r\nX-Evil: header.txt");
        assert!(!result.contains('\r'));
        assert!(!result.contains('\n'));
        assert!(result.contains("filename=\"file_X-Evil: header.txt\""));
    }

    #[tokio::test]
    async fn test_cancel_on_drop() {
        let (handle, cancel) = cancellation();
        drop(CancelOnDrop(Some(handle)));
        assert!(cancel.is_cancelled());

        let (handle, cancel) = cancellation();
        CancelOnDrop(Some(handle)).disarm();
        assert!(!cancel.is_cancelled());
    }
}
