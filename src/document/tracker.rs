//! Registry of uploads whose progress can be polled.
//!
//! Uploads are keyed by owner and a client-chosen ID, so one user can never
//! observe another user's transfer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::progress::{ProgressReceiver, ProgressState};

/// How long a finished upload stays visible.
pub const DEFAULT_FINISHED_RETENTION: Duration = Duration::from_secs(300);

struct TrackedUpload {
    receiver: ProgressReceiver,
    /// When a sweep first saw the upload in a terminal state.
    finished_at: Option<Instant>,
}

/// Uploads in flight, plus recently finished ones.
pub struct UploadTracker {
    uploads: RwLock<HashMap<(String, String), TrackedUpload>>,
    retention: Duration,
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            uploads: RwLock::new(HashMap::new()),
            retention: DEFAULT_FINISHED_RETENTION,
        }
    }

    /// Keep finished uploads for `retention` after they are first swept.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Start tracking an upload.
    ///
    /// Returns false if the owner already has an unfinished upload with this
    /// ID. A finished one with the same ID is replaced.
    pub async fn register(&self, owner_id: &str, upload_id: &str, receiver: ProgressReceiver) -> bool {
        let mut uploads = self.uploads.write().await;

        let now = Instant::now();
        let retention = self.retention;
        uploads.retain(|_, tracked| {
            if !tracked.receiver.current().is_terminal() {
                return true;
            }
            match tracked.finished_at {
                Some(finished) => now.duration_since(finished) < retention,
                None => {
                    tracked.finished_at = Some(now);
                    true
                }
            }
        });

        let key = (owner_id.to_string(), upload_id.to_string());
        if let Some(existing) = uploads.get(&key) {
            if !existing.receiver.current().is_terminal() {
                return false;
            }
        }

        uploads.insert(
            key,
            TrackedUpload {
                receiver,
                finished_at: None,
            },
        );
        true
    }

    /// Latest state of one of the owner's uploads.
    pub async fn status(&self, owner_id: &str, upload_id: &str) -> Option<ProgressState> {
        let key = (owner_id.to_string(), upload_id.to_string());
        self.uploads
            .read()
            .await
            .get(&key)
            .map(|tracked| tracked.receiver.current())
    }

    /// Number of tracked uploads.
    pub async fn len(&self) -> usize {
        self.uploads.read().await.len()
    }

    /// Whether nothing is tracked.
    pub async fn is_empty(&self) -> bool {
        self.uploads.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::progress::progress_channel;

    #[tokio::test]
    async fn test_status_follows_reporter() {
        let tracker = UploadTracker::new();
        let (reporter, receiver) = progress_channel();
        assert!(tracker.register("alice", "u1", receiver).await);

        assert_eq!(tracker.status("alice", "u1").await, Some(ProgressState::Pending));
        reporter.report(40);
        assert_eq!(
            tracker.status("alice", "u1").await,
            Some(ProgressState::InProgress { percent: 40 })
        );
        reporter.complete(7);
        assert_eq!(
            tracker.status("alice", "u1").await,
            Some(ProgressState::Completed { document_id: 7 })
        );
    }

    #[tokio::test]
    async fn test_uploads_are_per_owner() {
        let tracker = UploadTracker::new();
        let (_reporter, receiver) = progress_channel();
        assert!(tracker.register("alice", "u1", receiver).await);

        assert!(tracker.status("bob", "u1").await.is_none());
        assert!(tracker.status("alice", "u2").await.is_none());

        let (_other, receiver) = progress_channel();
        assert!(tracker.register("bob", "u1", receiver).await);
        assert_eq!(tracker.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_rejected() {
        let tracker = UploadTracker::new();
        let (reporter, receiver) = progress_channel();
        assert!(tracker.register("alice", "u1", receiver).await);

        let (_second, receiver) = progress_channel();
        assert!(!tracker.register("alice", "u1", receiver).await);

        reporter.fail("remote: down");
        let (_third, receiver) = progress_channel();
        assert!(tracker.register("alice", "u1", receiver).await);
        assert_eq!(tracker.status("alice", "u1").await, Some(ProgressState::Pending));
    }

    #[tokio::test]
    async fn test_dropped_reporter_is_visible_as_failure() {
        let tracker = UploadTracker::new();
        let (reporter, receiver) = progress_channel();
        tracker.register("alice", "u1", receiver).await;
        drop(reporter);

        assert!(matches!(
            tracker.status("alice", "u1").await,
            Some(ProgressState::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_finished_uploads_expire() {
        let tracker = UploadTracker::new().with_retention(Duration::ZERO);
        let (reporter, receiver) = progress_channel();
        tracker.register("alice", "done", receiver).await;
        reporter.complete(1);

        // first sweep only stamps the finish time
        let (_a, receiver) = progress_channel();
        tracker.register("alice", "a", receiver).await;
        assert!(tracker.status("alice", "done").await.is_some());

        let (_b, receiver) = progress_channel();
        tracker.register("alice", "b", receiver).await;
        assert!(tracker.status("alice", "done").await.is_none());
        assert_eq!(tracker.len().await, 2);
        assert!(!tracker.is_empty().await);
    }
}
