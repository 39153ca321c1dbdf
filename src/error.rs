//! Error types for docpool.

use thiserror::Error;

/// Common error type for docpool.
#[derive(Error, Debug)]
pub enum DocpoolError {
    /// The storage account credential did not pass remote validation.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// No active storage account has enough free capacity.
    #[error("no storage account has {required} bytes available")]
    NoCapacityAvailable {
        /// Number of bytes the upload needed.
        required: u64,
    },

    /// The requester is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Bytes were stored but no metadata record exists for them.
    ///
    /// The caller can use `account_id` and `location` to clean up the blob.
    #[error("upload stored bytes at account {account_id} ({location}) but failed afterwards: {reason}")]
    PartialUploadFailure {
        /// Account holding the orphaned bytes.
        account_id: i64,
        /// Byte store location of the orphaned bytes.
        location: String,
        /// What went wrong after the bytes were stored.
        reason: String,
    },

    /// Bytes were deleted but the metadata record could not be removed.
    #[error("document {document_id} bytes were deleted but its record remains: {reason}")]
    PartialDeleteFailure {
        /// Document whose record now points at nothing.
        document_id: i64,
        /// Why the record could not be removed.
        reason: String,
    },

    /// A backing service (database, byte store, remote API) is unavailable.
    ///
    /// Database and HTTP client errors are converted into this variant.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for DocpoolError {
    fn from(e: sqlx::Error) -> Self {
        DocpoolError::BackendUnavailable(format!("database: {e}"))
    }
}

impl From<reqwest::Error> for DocpoolError {
    fn from(e: reqwest::Error) -> Self {
        DocpoolError::BackendUnavailable(format!("remote: {e}"))
    }
}

/// Result type alias for docpool operations.
pub type Result<T> = std::result::Result<T, DocpoolError>;
