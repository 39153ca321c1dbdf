//! Placement policies: which account receives a new upload.

use std::sync::Arc;

use super::account::StorageAccount;
use crate::config::Placement;

/// Ranks candidate accounts for an upload of a given size.
///
/// Implementations only order candidates; the pool claims capacity on them
/// one at a time and moves on if a claim loses a race.
pub trait PlacementPolicy: Send + Sync {
    /// Policy name for logging.
    fn name(&self) -> &'static str;

    /// Return the IDs of accounts able to hold `required` bytes, best first.
    fn rank(&self, accounts: &[StorageAccount], required: u64) -> Vec<i64>;
}

/// First active account in pool order with enough free space.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl PlacementPolicy for FirstFit {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn rank(&self, accounts: &[StorageAccount], required: u64) -> Vec<i64> {
        let mut candidates: Vec<&StorageAccount> =
            accounts.iter().filter(|a| a.can_hold(required)).collect();
        candidates.sort_by_key(|a| a.id);
        candidates.into_iter().map(|a| a.id).collect()
    }
}

/// Account with the smallest sufficient free space; ties go to pool order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestFit;

impl PlacementPolicy for BestFit {
    fn name(&self) -> &'static str {
        "best-fit"
    }

    fn rank(&self, accounts: &[StorageAccount], required: u64) -> Vec<i64> {
        let mut candidates: Vec<&StorageAccount> =
            accounts.iter().filter(|a| a.can_hold(required)).collect();
        candidates.sort_by_key(|a| (a.free_bytes(), a.id));
        candidates.into_iter().map(|a| a.id).collect()
    }
}

/// Policy selected by configuration.
pub fn policy_for(placement: Placement) -> Arc<dyn PlacementPolicy> {
    match placement {
        Placement::FirstFit => Arc::new(FirstFit),
        Placement::BestFit => Arc::new(BestFit),
    }
}
