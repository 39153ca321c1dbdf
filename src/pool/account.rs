//! Storage account types and repository.

use std::fmt;

use sqlx::{QueryBuilder, SqlitePool};

use crate::Result;

const ACCOUNT_COLUMNS: &str = "id, owner_email, access_credential, refresh_credential, is_active,
    used_capacity_bytes, total_capacity_bytes, reserved_bytes, added_at, last_checked_at";

/// A pooled external storage account.
#[derive(Clone, sqlx::FromRow)]
pub struct StorageAccount {
    /// Unique account ID (pool order).
    pub id: i64,
    /// Email of the Google account.
    pub owner_email: String,
    /// Current OAuth access token.
    pub access_credential: String,
    /// OAuth refresh token, if one was supplied.
    pub refresh_credential: Option<String>,
    /// Whether new uploads may be placed on this account.
    pub is_active: bool,
    /// Bytes used as of the last quota refresh plus committed uploads.
    pub used_capacity_bytes: i64,
    /// Total quota in bytes.
    pub total_capacity_bytes: i64,
    /// Bytes claimed by uploads still in flight.
    pub reserved_bytes: i64,
    /// When the account was added to the pool.
    pub added_at: String,
    /// When the account was last updated or revalidated.
    pub last_checked_at: String,
}

impl StorageAccount {
    /// Free bytes available for new placements.
    pub fn free_bytes(&self) -> u64 {
        let free = self.total_capacity_bytes - self.used_capacity_bytes - self.reserved_bytes;
        free.max(0) as u64
    }

    /// Whether an upload of `required` bytes may be placed here.
    pub fn can_hold(&self, required: u64) -> bool {
        self.is_active && self.free_bytes() >= required
    }
}

// Credentials are never written to logs.
impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("id", &self.id)
            .field("owner_email", &self.owner_email)
            .field("is_active", &self.is_active)
            .field("used_capacity_bytes", &self.used_capacity_bytes)
            .field("total_capacity_bytes", &self.total_capacity_bytes)
            .field("reserved_bytes", &self.reserved_bytes)
            .field("last_checked_at", &self.last_checked_at)
            .finish_non_exhaustive()
    }
}

/// Data for creating a new storage account.
#[derive(Clone)]
pub struct NewAccount {
    /// Email of the Google account.
    pub owner_email: String,
    /// OAuth access token.
    pub access_credential: String,
    /// OAuth refresh token.
    pub refresh_credential: Option<String>,
    /// Bytes already used.
    pub used_capacity_bytes: i64,
    /// Total quota in bytes.
    pub total_capacity_bytes: i64,
}

impl NewAccount {
    /// Create a new account description.
    pub fn new(
        owner_email: impl Into<String>,
        access_credential: impl Into<String>,
        used_capacity_bytes: i64,
        total_capacity_bytes: i64,
    ) -> Self {
        Self {
            owner_email: owner_email.into(),
            access_credential: access_credential.into(),
            refresh_credential: None,
            used_capacity_bytes,
            total_capacity_bytes,
        }
    }

    /// Set the refresh credential.
    pub fn with_refresh_credential(mut self, refresh: impl Into<String>) -> Self {
        self.refresh_credential = Some(refresh.into());
        self
    }
}

/// Partial update of a storage account.
#[derive(Clone, Default)]
pub struct AccountUpdate {
    /// New owner email.
    pub owner_email: Option<String>,
    /// New access credential.
    pub access_credential: Option<String>,
    /// New refresh credential (`Some(None)` clears it).
    pub refresh_credential: Option<Option<String>>,
    /// New activity state.
    pub is_active: Option<bool>,
    /// New used capacity.
    pub used_capacity_bytes: Option<i64>,
    /// New total capacity.
    pub total_capacity_bytes: Option<i64>,
}

impl AccountUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the activity state.
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Set the access credential.
    pub fn access_credential(mut self, credential: impl Into<String>) -> Self {
        self.access_credential = Some(credential.into());
        self
    }

    /// Set both capacity figures.
    pub fn capacity(mut self, used: i64, total: i64) -> Self {
        self.used_capacity_bytes = Some(used);
        self.total_capacity_bytes = Some(total);
        self
    }
}

/// Repository for storage account rows.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new active account.
    pub async fn create(&self, account: &NewAccount) -> Result<StorageAccount> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO storage_accounts
                (owner_email, access_credential, refresh_credential, is_active,
                 used_capacity_bytes, total_capacity_bytes)
             VALUES (?, ?, ?, 1, ?, ?) RETURNING id",
        )
        .bind(&account.owner_email)
        .bind(&account.access_credential)
        .bind(&account.refresh_credential)
        .bind(account.used_capacity_bytes)
        .bind(account.total_capacity_bytes)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| crate::DocpoolError::NotFound(format!("storage account {id}")))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StorageAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM storage_accounts WHERE id = ?");
        let account = sqlx::query_as::<_, StorageAccount>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// List all accounts in pool order.
    pub async fn list_all(&self) -> Result<Vec<StorageAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM storage_accounts ORDER BY id");
        let accounts = sqlx::query_as::<_, StorageAccount>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(accounts)
    }

    /// List active accounts in pool order.
    pub async fn list_active(&self) -> Result<Vec<StorageAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM storage_accounts WHERE is_active = 1 ORDER BY id"
        );
        let accounts = sqlx::query_as::<_, StorageAccount>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(accounts)
    }

    /// Apply a partial update; `last_checked_at` is stamped unconditionally.
    ///
    /// Returns the updated account, or None if not found.
    pub async fn update(&self, id: i64, update: &AccountUpdate) -> Result<Option<StorageAccount>> {
        let mut query: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE storage_accounts SET last_checked_at = datetime('now')");

        if let Some(ref email) = update.owner_email {
            query.push(", owner_email = ");
            query.push_bind(email.clone());
        }
        if let Some(ref credential) = update.access_credential {
            query.push(", access_credential = ");
            query.push_bind(credential.clone());
        }
        if let Some(ref refresh) = update.refresh_credential {
            query.push(", refresh_credential = ");
            query.push_bind(refresh.clone());
        }
        if let Some(is_active) = update.is_active {
            query.push(", is_active = ");
            query.push_bind(is_active);
        }
        if let Some(used) = update.used_capacity_bytes {
            query.push(", used_capacity_bytes = ");
            query.push_bind(used);
        }
        if let Some(total) = update.total_capacity_bytes {
            query.push(", total_capacity_bytes = ");
            query.push_bind(total);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Store freshly probed capacity figures.
    ///
    /// `used` is ignored while reservations are outstanding: their bytes are
    /// already on the remote side and get added again on commit.
    pub async fn refresh_capacity(&self, id: i64, used: Option<i64>, total: i64) -> Result<()> {
        sqlx::query(
            "UPDATE storage_accounts
             SET last_checked_at = datetime('now'),
                 total_capacity_bytes = ?1,
                 used_capacity_bytes = CASE
                     WHEN ?2 IS NOT NULL AND reserved_bytes = 0 THEN ?2
                     ELSE used_capacity_bytes
                 END
             WHERE id = ?3",
        )
        .bind(total)
        .bind(used)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete an account row.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM storage_accounts WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim `bytes` of free capacity on an active account.
    ///
    /// Returns false when the account is inactive, missing, or too full.
    pub async fn try_reserve(&self, id: i64, bytes: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE storage_accounts SET reserved_bytes = reserved_bytes + ?1
             WHERE id = ?2 AND is_active = 1
               AND total_capacity_bytes - used_capacity_bytes - reserved_bytes >= ?1",
        )
        .bind(bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move reserved bytes into used capacity.
    pub async fn commit_reservation(&self, id: i64, bytes: i64) -> Result<()> {
        sqlx::query(
            "UPDATE storage_accounts
             SET reserved_bytes = MAX(reserved_bytes - ?1, 0),
                 used_capacity_bytes = used_capacity_bytes + ?1
             WHERE id = ?2",
        )
        .bind(bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Return reserved bytes without using them.
    pub async fn release_reservation(&self, id: i64, bytes: i64) -> Result<()> {
        sqlx::query(
            "UPDATE storage_accounts SET reserved_bytes = MAX(reserved_bytes - ?, 0) WHERE id = ?",
        )
        .bind(bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Subtract bytes freed by a deletion from used capacity.
    pub async fn reclaim(&self, id: i64, bytes: i64) -> Result<()> {
        sqlx::query(
            "UPDATE storage_accounts
             SET used_capacity_bytes = MAX(used_capacity_bytes - ?, 0)
             WHERE id = ?",
        )
        .bind(bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Count documents whose bytes live on the account.
    pub async fn count_documents(&self, id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE account_id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
