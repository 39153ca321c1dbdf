//! API handlers.

pub mod account;
pub mod auth;
pub mod document;

use std::sync::Arc;

use crate::auth::IdentityResolver;
use crate::document::{DocumentService, ShareService, UploadTracker};
use crate::pool::AccountPool;
use crate::Database;

pub use account::*;
pub use auth::*;
pub use document::*;

/// Application state shared across handlers.
pub struct AppState {
    /// Metadata database.
    pub db: Database,
    /// Maps verified principals to stored users.
    pub identity: IdentityResolver,
    /// Storage account pool.
    pub pool: Arc<AccountPool>,
    /// Document store.
    pub documents: Arc<DocumentService>,
    /// Read ACL management.
    pub sharing: ShareService,
    /// Uploads whose progress can be polled.
    pub uploads: UploadTracker,
}

impl AppState {
    /// Assemble the state from its services.
    pub fn new(
        db: Database,
        identity: IdentityResolver,
        pool: Arc<AccountPool>,
        documents: Arc<DocumentService>,
    ) -> Self {
        let sharing = ShareService::new(db.clone());
        Self {
            db,
            identity,
            pool,
            documents,
            sharing,
            uploads: UploadTracker::new(),
        }
    }
}
