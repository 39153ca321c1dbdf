//! docpool - document storage and sharing on a pool of Google Drive accounts.
//!
//! Users authenticate through an external identity provider, upload documents
//! that land on whichever pooled account has room, and share them read-only
//! with other users by email.

pub mod auth;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod logging;
pub mod pool;
pub mod web;

pub use auth::{
    classify, AdminPolicy, IdentityResolver, PermissionError, Principal, ValidationError,
};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository, UserUpdate};
pub use document::{
    cancellation, progress_channel, ByteStore, Document, DocumentService, ListScope,
    LocalByteStore, ProgressState, ShareService, UploadRequest,
};
pub use error::{DocpoolError, Result};
pub use pool::{AccountPool, PlacementPolicy, StorageAccount};
