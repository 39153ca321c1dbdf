//! Document metadata and read ACL persistence.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::{DocpoolError, Result};

const DOCUMENT_COLUMNS: &str = "d.id, d.name, d.mime_type, d.size_bytes, d.owner_id, d.account_id,
    d.storage_path, d.download_url, d.checksum, d.uploaded_at";

/// IDs of one window of a user's documents. Binds: owner, limit, offset.
const OWNED_WINDOW: &str = "SELECT d.id FROM documents d
    WHERE d.owner_id = ?
    ORDER BY d.uploaded_at DESC, d.id DESC
    LIMIT ? OFFSET ?";

/// IDs of one window of documents shared with an email. Binds: email, limit, offset.
const SHARED_WINDOW: &str = "SELECT d.id FROM documents d
    JOIN document_shares s ON s.document_id = d.id
    WHERE s.email = ?
    ORDER BY d.uploaded_at DESC, d.id DESC
    LIMIT ? OFFSET ?";

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Document {
    /// Unique document ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// ID of the owning user.
    pub owner_id: String,
    /// Account holding the bytes.
    pub account_id: i64,
    /// Byte store location on that account.
    pub storage_path: String,
    /// URL the bytes can be fetched from.
    pub download_url: String,
    /// Lowercase hex SHA-256 of the content.
    pub checksum: String,
    /// Upload timestamp.
    pub uploaded_at: String,
    /// Normalized emails with read access.
    #[sqlx(skip)]
    pub shared_with: Vec<String>,
}

/// Data for creating a new document record.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub owner_id: String,
    pub account_id: i64,
    pub storage_path: String,
    pub download_url: String,
    pub checksum: String,
}

/// Offset/limit window for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: i64,
    /// Maximum rows to return; negative means no limit.
    pub limit: i64,
}

impl Page {
    /// Create a window.
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    /// Every row.
    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: -1,
        }
    }
}

/// Repository for documents and their shares.
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new document with an empty share set.
    pub async fn create(&self, doc: &NewDocument) -> Result<Document> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents
                (name, mime_type, size_bytes, owner_id, account_id, storage_path, download_url, checksum)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&doc.name)
        .bind(&doc.mime_type)
        .bind(doc.size_bytes)
        .bind(&doc.owner_id)
        .bind(doc.account_id)
        .bind(&doc.storage_path)
        .bind(&doc.download_url)
        .bind(&doc.checksum)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("document {id}")))
    }

    /// Get a document by ID, including its share set.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.id = ?");
        let doc = sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        match doc {
            Some(mut doc) => {
                doc.shared_with = self.shares_for(id).await?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Documents owned by a user, newest first.
    pub async fn list_owned(&self, owner_id: &str, page: Page) -> Result<Vec<Document>> {
        self.list_window(OWNED_WINDOW, owner_id, page).await
    }

    /// Documents shared with an email, newest first.
    pub async fn list_shared(&self, email: &str, page: Page) -> Result<Vec<Document>> {
        self.list_window(SHARED_WINDOW, email, page).await
    }

    /// Load the documents selected by `window`, then their shares.
    ///
    /// Both queries filter through the same window so the number of bound
    /// parameters does not grow with the result.
    async fn list_window(&self, window: &str, key: &str, page: Page) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d
             WHERE d.id IN ({window})
             ORDER BY d.uploaded_at DESC, d.id DESC"
        );
        let mut docs = sqlx::query_as::<_, Document>(&sql)
            .bind(key)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;
        if docs.is_empty() {
            return Ok(docs);
        }

        let sql = format!(
            "SELECT document_id, email FROM document_shares
             WHERE document_id IN ({window})
             ORDER BY email"
        );
        let rows: Vec<(i64, String)> = sqlx::query_as(&sql)
            .bind(key)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        let mut by_document: HashMap<i64, Vec<String>> = HashMap::new();
        for (document_id, email) in rows {
            by_document.entry(document_id).or_default().push(email);
        }
        for doc in docs.iter_mut() {
            doc.shared_with = by_document.remove(&doc.id).unwrap_or_default();
        }
        Ok(docs)
    }

    /// Count documents owned by a user.
    pub async fn count_owned(&self, owner_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count documents shared with an email.
    pub async fn count_shared(&self, email: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM document_shares WHERE email = ?")
                .bind(email)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Delete a document record; shares go with it.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Grant read access. Returns false if the email already had it.
    pub async fn add_share(&self, document_id: i64, email: &str) -> Result<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO document_shares (document_id, email) VALUES (?, ?)")
                .bind(document_id)
                .bind(email)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke read access. Returns false if the email did not have it.
    pub async fn remove_share(&self, document_id: i64, email: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM document_shares WHERE document_id = ? AND email = ?")
            .bind(document_id)
            .bind(email)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Emails a document is shared with, sorted.
    pub async fn shares_for(&self, document_id: i64) -> Result<Vec<String>> {
        let emails: Vec<String> = sqlx::query_scalar(
            "SELECT email FROM document_shares WHERE document_id = ? ORDER BY email",
        )
        .bind(document_id)
        .fetch_all(self.pool)
        .await?;
        Ok(emails)
    }
}
