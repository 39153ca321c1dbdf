//! Storage account pool.
//!
//! Tracks the Google Drive accounts that hold document bytes, validates their
//! credentials, and decides where each new upload goes.

pub mod account;
pub mod credential;
pub mod placement;
pub mod service;

pub use account::{AccountRepository, AccountUpdate, NewAccount, StorageAccount};
pub use credential::{
    build_http_client, CapacityProbe, CredentialValidator, DriveQuotaProbe, FixedCapacityProbe,
    GoogleTokenValidator, Quota,
};
pub use placement::{policy_for, BestFit, FirstFit, PlacementPolicy};
pub use service::{AccountPool, Reservation, RevalidationReport, DEFAULT_TOTAL_CAPACITY};
