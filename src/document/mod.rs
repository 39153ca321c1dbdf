//! Document storage and sharing.
//!
//! Metadata lives in SQLite; bytes live on a [`ByteStore`] backed by the
//! account pool. Uploads report progress through a latest-value channel that
//! callers can poll through an [`UploadTracker`], and can be cancelled
//! between chunks.

pub mod drive;
pub mod metadata;
pub mod progress;
pub mod service;
pub mod sharing;
pub mod storage;
pub mod tracker;

pub use drive::DriveByteStore;
pub use metadata::{Document, DocumentRepository, NewDocument, Page};
pub use progress::{
    cancellation, progress_channel, CancelHandle, ProgressReceiver, ProgressReporter,
    ProgressState, UploadCancel,
};
pub use service::{
    checksum, detect_mime_type, DocumentService, ListScope, UploadRequest,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use sharing::ShareService;
pub use storage::{ByteStore, LocalByteStore, StoredObject};
pub use tracker::{UploadTracker, DEFAULT_FINISHED_RETENTION};
