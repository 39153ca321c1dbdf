//! Upload progress reporting and cancellation.
//!
//! Progress is a latest-value channel: the uploader writes, the caller reads
//! whatever state is current. Intermediate percentages may be skipped, but
//! the reported value never goes backwards and a terminal state always
//! arrives, even if the uploader is dropped mid-transfer.

use serde::Serialize;
use tokio::sync::watch;

/// State of an upload as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgressState {
    /// Accepted, no bytes transferred yet.
    Pending,
    /// Transfer under way.
    InProgress {
        /// Percentage of bytes transferred, 0..=100.
        percent: u8,
    },
    /// Upload finished and the document record exists.
    Completed {
        /// ID of the new document.
        document_id: i64,
    },
    /// Upload failed.
    Failed {
        /// Human readable reason.
        message: String,
    },
    /// Upload was cancelled by the caller.
    Cancelled,
}

impl ProgressState {
    /// Whether no further updates will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressState::Completed { .. } | ProgressState::Failed { .. } | ProgressState::Cancelled
        )
    }

    /// Percentage implied by the state.
    pub fn percent(&self) -> u8 {
        match self {
            ProgressState::Pending => 0,
            ProgressState::InProgress { percent } => *percent,
            ProgressState::Completed { .. } => 100,
            ProgressState::Failed { .. } | ProgressState::Cancelled => 0,
        }
    }
}

/// Create a connected reporter/receiver pair.
pub fn progress_channel() -> (ProgressReporter, ProgressReceiver) {
    let (tx, rx) = watch::channel(ProgressState::Pending);
    (ProgressReporter { tx }, ProgressReceiver { rx })
}

/// Writing half, held by the document store during an upload.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: watch::Sender<ProgressState>,
}

impl ProgressReporter {
    /// A reporter nobody listens to.
    pub fn detached() -> Self {
        progress_channel().0
    }

    /// Publish a percentage. Lower values than the last one are ignored.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.tx.send_if_modified(|state| match state {
            ProgressState::Pending => {
                *state = ProgressState::InProgress { percent };
                true
            }
            ProgressState::InProgress { percent: current } if percent > *current => {
                *current = percent;
                true
            }
            _ => false,
        });
    }

    /// Publish progress as a fraction of bytes transferred.
    pub fn report_bytes(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total).saturating_mul(100) / total) as u8
        };
        self.report(percent);
    }

    fn finish(&self, terminal: ProgressState) {
        self.tx.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = terminal;
            true
        });
    }

    /// Mark the upload as completed.
    pub fn complete(&self, document_id: i64) {
        self.finish(ProgressState::Completed { document_id });
    }

    /// Mark the upload as failed.
    pub fn fail(&self, message: impl Into<String>) {
        self.finish(ProgressState::Failed {
            message: message.into(),
        });
    }

    /// Mark the upload as cancelled.
    pub fn cancelled(&self) {
        self.finish(ProgressState::Cancelled);
    }

    /// Current state.
    pub fn state(&self) -> ProgressState {
        self.tx.borrow().clone()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish(ProgressState::Failed {
            message: "upload aborted".to_string(),
        });
    }
}

/// Reading half, held by the caller.
#[derive(Debug, Clone)]
pub struct ProgressReceiver {
    rx: watch::Receiver<ProgressState>,
}

impl ProgressReceiver {
    /// Latest state.
    pub fn current(&self) -> ProgressState {
        self.rx.borrow().clone()
    }

    /// Wait for the next state change.
    ///
    /// Returns None once the reporter is gone and nothing new is pending.
    pub async fn changed(&mut self) -> Option<ProgressState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the upload reaches a terminal state.
    pub async fn wait_terminal(&mut self) -> ProgressState {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if state.is_terminal() {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return self.current();
            }
        }
    }
}

/// Create a connected cancel handle/token pair.
pub fn cancellation() -> (CancelHandle, UploadCancel) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, UploadCancel { rx })
}

/// Held by the caller; requests cancellation of an upload.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Checked by the document store between upload steps.
#[derive(Debug, Clone)]
pub struct UploadCancel {
    rx: watch::Receiver<bool>,
}

impl UploadCancel {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        cancellation().1
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Never resolves if the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
