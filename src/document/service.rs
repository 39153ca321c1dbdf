//! Document store service: upload, listing, retrieval, deletion.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use super::metadata::{Document, DocumentRepository, NewDocument, Page};
use super::progress::{ProgressReporter, UploadCancel};
use super::storage::{ByteStore, StoredObject};
use crate::auth::permission::{require_owner, require_read};
use crate::auth::validation::{normalize_email, validate_document_name};
use crate::db::{Database, User};
use crate::pool::{AccountPool, Reservation, StorageAccount};
use crate::{DocpoolError, Result};

/// Default maximum upload size (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Which documents a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListScope {
    /// Documents the user owns.
    #[default]
    Owned,
    /// Documents other users shared with the user.
    #[serde(alias = "shared")]
    SharedWithMe,
}

/// An upload as handed to the document store.
#[derive(Clone)]
pub struct UploadRequest {
    /// Display name.
    pub name: String,
    /// MIME type; guessed from the name when absent.
    pub mime_type: Option<String>,
    /// File content.
    pub content: Vec<u8>,
}

impl UploadRequest {
    /// Create a request with the MIME type left to detection.
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            content,
        }
    }

    /// Set an explicit MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Lowercase hex SHA-256 of the content.
pub fn checksum(content: &[u8]) -> String {
    Sha256::digest(content)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Resolve the MIME type of an upload.
pub fn detect_mime_type(name: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim).filter(|m| !m.is_empty()) {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Service for document storage.
pub struct DocumentService {
    db: Database,
    pool: Arc<AccountPool>,
    store: Arc<dyn ByteStore>,
    max_upload_bytes: u64,
}

impl DocumentService {
    /// Create a new document service.
    pub fn new(db: Database, pool: Arc<AccountPool>, store: Arc<dyn ByteStore>) -> Self {
        Self {
            db,
            pool,
            store,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set the maximum upload size.
    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    fn repo(&self) -> DocumentRepository<'_> {
        DocumentRepository::new(self.db.pool())
    }

    /// Upload a document owned by `owner`.
    ///
    /// `progress` always ends in a terminal state, whatever the outcome.
    pub async fn upload(
        &self,
        request: UploadRequest,
        owner: &User,
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<Document> {
        let result = self.run_upload(request, owner, progress, cancel).await;
        match &result {
            Ok(doc) => progress.complete(doc.id),
            Err(DocpoolError::Cancelled) => progress.cancelled(),
            Err(e) => progress.fail(e.to_string()),
        }
        result
    }

    async fn run_upload(
        &self,
        request: UploadRequest,
        owner: &User,
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<Document> {
        validate_document_name(&request.name)?;
        let size = request.content.len() as u64;
        if size > self.max_upload_bytes {
            return Err(DocpoolError::Validation(format!(
                "document is {size} bytes, maximum is {}",
                self.max_upload_bytes
            )));
        }
        let mime_type = detect_mime_type(&request.name, request.mime_type.as_deref());

        if cancel.is_cancelled() {
            return Err(DocpoolError::Cancelled);
        }

        let reservation = self.pool.reserve(size).await?;
        let account = match self.pool.get_account(reservation.account_id).await {
            Ok(account) => account,
            Err(e) => return Err(self.release_after(reservation, e).await),
        };

        progress.report(0);
        let stored = match self
            .store
            .put(&account, &request.name, &mime_type, &request.content, progress, cancel)
            .await
        {
            Ok(stored) => stored,
            Err(e) => return Err(self.release_after(reservation, e).await),
        };

        if cancel.is_cancelled() {
            let err = self.discard(&account, &stored, DocpoolError::Cancelled).await;
            return Err(self.release_after(reservation, err).await);
        }

        if let Err(e) = self.pool.commit(reservation).await {
            return Err(self.discard(&account, &stored, e).await);
        }

        let new_doc = NewDocument {
            name: request.name,
            mime_type,
            size_bytes: size as i64,
            owner_id: owner.id.clone(),
            account_id: account.id,
            storage_path: stored.location.clone(),
            download_url: stored.download_url.clone(),
            checksum: checksum(&request.content),
        };

        match self.repo().create(&new_doc).await {
            Ok(doc) => {
                info!(
                    document_id = doc.id,
                    owner = %owner.id,
                    account_id = account.id,
                    size,
                    "Document uploaded"
                );
                Ok(doc)
            }
            Err(e) => {
                if let Err(reclaim) = self.pool.reclaim(account.id, size).await {
                    warn!(account_id = account.id, error = %reclaim, "Failed to reclaim capacity");
                }
                error!(
                    account_id = account.id,
                    location = %stored.location,
                    error = %e,
                    "Bytes stored but document record could not be saved"
                );
                Err(DocpoolError::PartialUploadFailure {
                    account_id: account.id,
                    location: stored.location,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Release a reservation after a failure and hand back the failure.
    async fn release_after(&self, reservation: Reservation, err: DocpoolError) -> DocpoolError {
        let account_id = reservation.account_id;
        if let Err(e) = self.pool.release(reservation).await {
            warn!(account_id, error = %e, "Failed to release reservation");
        }
        err
    }

    /// Remove bytes that will not get a record. Returns `err` if removal worked.
    async fn discard(
        &self,
        account: &StorageAccount,
        stored: &StoredObject,
        err: DocpoolError,
    ) -> DocpoolError {
        match self.store.delete(account, &stored.location).await {
            Ok(()) => err,
            Err(cleanup) => {
                error!(
                    account_id = account.id,
                    location = %stored.location,
                    error = %cleanup,
                    "Failed to remove bytes of an abandoned upload"
                );
                DocpoolError::PartialUploadFailure {
                    account_id: account.id,
                    location: stored.location.clone(),
                    reason: format!("{err}; cleanup failed: {cleanup}"),
                }
            }
        }
    }

    /// All documents in scope for the user, newest first.
    pub async fn list(&self, user: &User, scope: ListScope) -> Result<Vec<Document>> {
        self.list_page(user, scope, Page::all()).await
    }

    /// One page of documents in scope for the user.
    pub async fn list_page(&self, user: &User, scope: ListScope, page: Page) -> Result<Vec<Document>> {
        let repo = self.repo();
        match scope {
            ListScope::Owned => repo.list_owned(&user.id, page).await,
            ListScope::SharedWithMe => repo.list_shared(&normalize_email(&user.email), page).await,
        }
    }

    /// Number of documents in scope for the user.
    pub async fn count(&self, user: &User, scope: ListScope) -> Result<i64> {
        let repo = self.repo();
        match scope {
            ListScope::Owned => repo.count_owned(&user.id).await,
            ListScope::SharedWithMe => repo.count_shared(&normalize_email(&user.email)).await,
        }
    }

    /// Document record by ID, without an access check.
    pub async fn get_details(&self, document_id: i64) -> Result<Document> {
        self.repo()
            .get_by_id(document_id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("document {document_id}")))
    }

    /// Document record by ID, visible to the user.
    pub async fn get_for(&self, document_id: i64, user: &User) -> Result<Document> {
        let doc = self.get_details(document_id).await?;
        require_read(&doc, user)?;
        Ok(doc)
    }

    /// Document record and content, visible to the user.
    pub async fn download(&self, document_id: i64, user: &User) -> Result<(Document, Vec<u8>)> {
        let doc = self.get_for(document_id, user).await?;
        let account = self.pool.get_account(doc.account_id).await?;
        let content = self.store.get(&account, &doc.storage_path).await?;
        Ok((doc, content))
    }

    /// Delete a document owned by `requester`.
    ///
    /// Bytes go first. If they cannot be removed the record stays and the
    /// store error is returned; if the record cannot be removed afterwards
    /// the result is `PartialDeleteFailure`.
    pub async fn delete(&self, document_id: i64, requester: &User) -> Result<()> {
        let doc = self.get_details(document_id).await?;
        require_owner(&doc, requester)?;

        let account = self.pool.get_account(doc.account_id).await?;
        if let Err(e) = self.store.delete(&account, &doc.storage_path).await {
            warn!(document_id, error = %e, "Failed to delete document bytes, record kept");
            return Err(e);
        }

        if let Err(e) = self.repo().delete(document_id).await {
            error!(
                document_id,
                account_id = account.id,
                location = %doc.storage_path,
                error = %e,
                "Document bytes deleted but record remains"
            );
            return Err(DocpoolError::PartialDeleteFailure {
                document_id,
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.pool.reclaim(account.id, doc.size_bytes.max(0) as u64).await {
            warn!(account_id = account.id, error = %e, "Failed to reclaim capacity");
        }

        info!(document_id, owner = %requester.id, "Document deleted");
        Ok(())
    }
}
