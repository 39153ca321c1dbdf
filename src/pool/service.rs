//! Account pool service.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::account::{AccountRepository, AccountUpdate, NewAccount, StorageAccount};
use super::credential::{CapacityProbe, CredentialValidator, Quota};
use super::placement::{FirstFit, PlacementPolicy};
use crate::auth::validation::{normalize_email, validate_email};
use crate::db::Database;
use crate::{DocpoolError, Result};

/// Default total capacity when the quota lookup fails (15 GiB).
pub const DEFAULT_TOTAL_CAPACITY: u64 = 15 * 1024 * 1024 * 1024;

/// Capacity claimed on an account for an upload in flight.
///
/// Must be passed back to [`AccountPool::commit`] or [`AccountPool::release`].
#[must_use = "a reservation holds capacity until committed or released"]
#[derive(Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Account holding the reservation.
    pub account_id: i64,
    /// Reserved bytes.
    pub bytes: u64,
}

/// Outcome of a revalidation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevalidationReport {
    /// Number of active accounts checked.
    pub checked: usize,
    /// Accounts deactivated because their credential failed.
    pub deactivated: Vec<i64>,
    /// Accounts whose capacity figures were refreshed.
    pub refreshed: usize,
}

/// Service managing the pool of storage accounts.
pub struct AccountPool {
    db: Database,
    validator: Arc<dyn CredentialValidator>,
    probe: Arc<dyn CapacityProbe>,
    policy: Arc<dyn PlacementPolicy>,
    default_total: u64,
}

fn to_db_bytes(bytes: u64) -> Result<i64> {
    i64::try_from(bytes)
        .map_err(|_| DocpoolError::Validation(format!("size {bytes} is out of range")))
}

impl AccountPool {
    /// Create a pool with the first-fit policy.
    pub fn new(
        db: Database,
        validator: Arc<dyn CredentialValidator>,
        probe: Arc<dyn CapacityProbe>,
    ) -> Self {
        Self {
            db,
            validator,
            probe,
            policy: Arc::new(FirstFit),
            default_total: DEFAULT_TOTAL_CAPACITY,
        }
    }

    /// Use a different placement policy.
    pub fn with_policy(mut self, policy: Arc<dyn PlacementPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Name of the placement policy in use.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Set the total capacity assumed when the quota lookup fails.
    pub fn with_default_total(mut self, bytes: u64) -> Self {
        self.default_total = bytes;
        self
    }

    fn repo(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.db.pool())
    }

    async fn ensure_valid(&self, access_credential: &str) -> Result<()> {
        if access_credential.trim().is_empty() {
            return Err(DocpoolError::InvalidCredential(
                "access credential is empty".to_string(),
            ));
        }
        if !self.validator.validate(access_credential).await {
            return Err(DocpoolError::InvalidCredential(
                "access credential was rejected by the provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Add an account after validating its credential.
    ///
    /// Nothing is persisted when validation fails.
    pub async fn add_account(
        &self,
        owner_email: &str,
        access_credential: &str,
        refresh_credential: Option<&str>,
    ) -> Result<i64> {
        let email = normalize_email(owner_email);
        validate_email(&email)?;
        self.ensure_valid(access_credential).await?;

        let quota = match self.probe.quota(access_credential).await {
            Ok(quota) => quota,
            Err(e) => {
                warn!(email = %email, error = %e, "Quota lookup failed, using default capacity");
                Quota {
                    used: 0,
                    total: self.default_total,
                }
            }
        };

        let mut new_account = NewAccount::new(
            email,
            access_credential,
            to_db_bytes(quota.used)?,
            to_db_bytes(quota.total)?,
        );
        if let Some(refresh) = refresh_credential.filter(|r| !r.is_empty()) {
            new_account = new_account.with_refresh_credential(refresh);
        }

        let account = self.repo().create(&new_account).await?;
        info!(
            account_id = account.id,
            email = %account.owner_email,
            total = account.total_capacity_bytes,
            "Storage account added"
        );
        Ok(account.id)
    }

    /// List all accounts in pool order.
    pub async fn list_accounts(&self) -> Result<Vec<StorageAccount>> {
        self.repo().list_all().await
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: i64) -> Result<StorageAccount> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("storage account {id}")))
    }

    /// Apply a partial update. A new access credential is validated first.
    pub async fn update_account(&self, id: i64, update: AccountUpdate) -> Result<StorageAccount> {
        let mut update = update;
        if let Some(ref email) = update.owner_email {
            let email = normalize_email(email);
            validate_email(&email)?;
            update.owner_email = Some(email);
        }
        if let Some(ref credential) = update.access_credential {
            self.ensure_valid(credential).await?;
        }

        let account = self
            .repo()
            .update(id, &update)
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("storage account {id}")))?;
        info!(account_id = id, "Storage account updated");
        Ok(account)
    }

    /// Stop placing new uploads on an account. Existing documents stay readable.
    pub async fn deactivate_account(&self, id: i64) -> Result<StorageAccount> {
        let account = self
            .repo()
            .update(id, &AccountUpdate::new().active(false))
            .await?
            .ok_or_else(|| DocpoolError::NotFound(format!("storage account {id}")))?;
        info!(account_id = id, "Storage account deactivated");
        Ok(account)
    }

    /// Remove an account that holds no documents.
    pub async fn delete_account(&self, id: i64) -> Result<()> {
        let repo = self.repo();
        if repo.get_by_id(id).await?.is_none() {
            return Err(DocpoolError::NotFound(format!("storage account {id}")));
        }

        let documents = repo.count_documents(id).await?;
        if documents > 0 {
            return Err(DocpoolError::Conflict(format!(
                "storage account {id} still holds {documents} document(s); deactivate it instead"
            )));
        }

        repo.delete(id).await?;
        info!(account_id = id, "Storage account deleted");
        Ok(())
    }

    /// Evaluate placement without claiming capacity.
    pub async fn select_account_for_upload(&self, required_bytes: u64) -> Result<i64> {
        let accounts = self.repo().list_active().await?;
        self.policy
            .rank(&accounts, required_bytes)
            .first()
            .copied()
            .ok_or(DocpoolError::NoCapacityAvailable {
                required: required_bytes,
            })
    }

    /// Claim capacity for an upload on the best available account.
    pub async fn reserve(&self, required_bytes: u64) -> Result<Reservation> {
        let bytes = to_db_bytes(required_bytes)?;
        let repo = self.repo();
        let accounts = repo.list_active().await?;

        for account_id in self.policy.rank(&accounts, required_bytes) {
            if repo.try_reserve(account_id, bytes).await? {
                debug!(
                    account_id,
                    bytes = required_bytes,
                    policy = self.policy.name(),
                    "Capacity reserved"
                );
                return Ok(Reservation {
                    account_id,
                    bytes: required_bytes,
                });
            }
            debug!(account_id, "Reservation lost to a concurrent upload, trying next");
        }

        warn!(bytes = required_bytes, "No storage account has enough capacity");
        Err(DocpoolError::NoCapacityAvailable {
            required: required_bytes,
        })
    }

    /// Turn a reservation into used capacity.
    pub async fn commit(&self, reservation: Reservation) -> Result<()> {
        self.repo()
            .commit_reservation(reservation.account_id, to_db_bytes(reservation.bytes)?)
            .await
    }

    /// Give back a reservation that will not be used.
    pub async fn release(&self, reservation: Reservation) -> Result<()> {
        self.repo()
            .release_reservation(reservation.account_id, to_db_bytes(reservation.bytes)?)
            .await
    }

    /// Return capacity freed by deleting a document.
    pub async fn reclaim(&self, account_id: i64, bytes: u64) -> Result<()> {
        self.repo().reclaim(account_id, to_db_bytes(bytes)?).await
    }

    /// Check every active account's credential.
    ///
    /// Failing accounts are deactivated; passing ones get fresh capacity
    /// figures. Remote usage is only taken over for accounts with no upload
    /// in flight. Inactive accounts are left alone.
    pub async fn revalidate_all(&self) -> Result<RevalidationReport> {
        let repo = self.repo();
        let mut report = RevalidationReport::default();

        for account in repo.list_active().await? {
            report.checked += 1;

            if !self.validator.validate(&account.access_credential).await {
                repo.update(account.id, &AccountUpdate::new().active(false))
                    .await?;
                warn!(
                    account_id = account.id,
                    email = %account.owner_email,
                    "Credential no longer valid, account deactivated"
                );
                report.deactivated.push(account.id);
                continue;
            }

            match self.probe.quota(&account.access_credential).await {
                Ok(quota) => {
                    report.refreshed += 1;
                    let used = if self.probe.reports_usage() {
                        Some(to_db_bytes(quota.used)?)
                    } else {
                        None
                    };
                    repo.refresh_capacity(account.id, used, to_db_bytes(quota.total)?)
                        .await?;
                }
                Err(e) => {
                    warn!(account_id = account.id, error = %e, "Quota refresh failed");
                    repo.update(account.id, &AccountUpdate::new()).await?;
                }
            }
        }

        info!(
            checked = report.checked,
            deactivated = report.deactivated.len(),
            refreshed = report.refreshed,
            "Storage account revalidation finished"
        );
        Ok(report)
    }
}
