//! Byte stores: where document content physically lives.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::progress::{ProgressReporter, UploadCancel};
use crate::pool::StorageAccount;
use crate::{DocpoolError, Result};

/// Default write chunk size (2 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Where a store put the bytes of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Store-specific location, persisted with the document.
    pub location: String,
    /// URL a client can fetch the bytes from.
    pub download_url: String,
}

/// Byte storage on a pooled account.
///
/// `put` checks `cancel` between chunks. When it returns `Cancelled` it has
/// already removed anything it wrote; if that removal fails it returns
/// `PartialUploadFailure` instead.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Store `content` under a new location on `account`.
    async fn put(
        &self,
        account: &StorageAccount,
        name: &str,
        mime_type: &str,
        content: &[u8],
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<StoredObject>;

    /// Read the bytes at `location`. A missing object is `NotFound`.
    async fn get(&self, account: &StorageAccount, location: &str) -> Result<Vec<u8>>;

    /// Remove the bytes at `location`. Removing a missing object succeeds.
    async fn delete(&self, account: &StorageAccount, location: &str) -> Result<()>;
}

/// Filesystem byte store.
///
/// Each account gets its own directory, sharded by the first two
/// characters of the stored name:
/// ```text
/// {base_path}/
/// ├── 1/
/// │   ├── ab/
/// │   │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
/// │   └── cd/
/// └── 2/
/// ```
#[derive(Debug, Clone)]
pub struct LocalByteStore {
    base_path: PathBuf,
    chunk_size: usize,
}

impl LocalByteStore {
    /// Create a store rooted at `base_path`, creating the directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Set the write chunk size. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Base directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Generate a UUID-based stored name keeping the original extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|s| s.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        format!("{}.{ext}", Uuid::new_v4())
    }

    fn shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Resolve a location to a path inside the account directory.
    ///
    /// Locations containing anything other than plain path segments are rejected.
    pub fn path_for(&self, account_id: i64, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if location.is_empty() || !plain {
            return Err(DocpoolError::Validation(format!(
                "invalid storage location: {location}"
            )));
        }
        Ok(self.base_path.join(account_id.to_string()).join(relative))
    }

    async fn write_chunks(
        &self,
        path: &Path,
        content: &[u8],
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(path).await?;
        let total = content.len() as u64;
        let mut written = 0u64;

        for chunk in content.chunks(self.chunk_size) {
            if cancel.is_cancelled() {
                return Err(DocpoolError::Cancelled);
            }
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress.report_bytes(written, total);
        }

        file.flush().await?;
        file.sync_all().await?;
        progress.report_bytes(total, total);
        Ok(())
    }
}

#[async_trait]
impl ByteStore for LocalByteStore {
    async fn put(
        &self,
        account: &StorageAccount,
        name: &str,
        _mime_type: &str,
        content: &[u8],
        progress: &ProgressReporter,
        cancel: &UploadCancel,
    ) -> Result<StoredObject> {
        let stored_name = Self::generate_stored_name(name);
        let location = format!("{}/{stored_name}", Self::shard(&stored_name));
        let path = self.path_for(account.id, &location)?;

        if let Err(e) = self.write_chunks(&path, content, progress, cancel).await {
            return match fs::remove_file(&path).await {
                Ok(()) => Err(e),
                Err(rm) if rm.kind() == io::ErrorKind::NotFound => Err(e),
                Err(rm) => {
                    warn!(path = %path.display(), error = %rm, "Failed to remove partial file");
                    Err(DocpoolError::PartialUploadFailure {
                        account_id: account.id,
                        location,
                        reason: format!("{e}; cleanup failed: {rm}"),
                    })
                }
            };
        }

        debug!(account_id = account.id, location = %location, size = content.len(), "Stored bytes");
        Ok(StoredObject {
            download_url: format!("local://{}/{location}", account.id),
            location,
        })
    }

    async fn get(&self, account: &StorageAccount, location: &str) -> Result<Vec<u8>> {
        let path = self.path_for(account.id, location)?;
        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DocpoolError::NotFound(format!("stored object {location}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, account: &StorageAccount, location: &str) -> Result<()> {
        let path = self.path_for(account.id, location)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(location = %location, "Stored object already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
