//! Remote credential validation and quota lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GoogleConfig;
use crate::{DocpoolError, Result};

/// User agent string for Google API calls.
const USER_AGENT: &str = "docpool/0.1";

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build the HTTP client shared by all Google collaborators.
///
/// Redirects are not followed: resumable uploads answer intermediate chunks
/// with `308 Resume Incomplete`, which must reach the caller.
pub fn build_http_client(config: &GoogleConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DocpoolError::Config(format!("failed to create HTTP client: {e}")))
}

/// Checks whether an access credential is currently accepted by the provider.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Returns true only if the remote check positively succeeded.
    async fn validate(&self, access_credential: &str) -> bool;
}

/// Storage quota reported for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Bytes in use.
    pub used: u64,
    /// Total bytes available to the account.
    pub total: u64,
}

/// Looks up the storage quota behind a credential.
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    /// Query `(used, total)` for the credential's account.
    async fn quota(&self, access_credential: &str) -> Result<Quota>;

    /// Whether `used` reflects the remote account. When false, only `total`
    /// is trusted on refresh and the pool keeps its own usage figure.
    fn reports_usage(&self) -> bool {
        true
    }
}

/// Validates tokens against Google's tokeninfo endpoint.
pub struct GoogleTokenValidator {
    client: Client,
    endpoint: String,
}

impl GoogleTokenValidator {
    /// Create a validator using the given client and configuration.
    pub fn new(client: Client, config: &GoogleConfig) -> Self {
        Self {
            client,
            endpoint: config.tokeninfo_url.clone(),
        }
    }
}

#[async_trait]
impl CredentialValidator for GoogleTokenValidator {
    async fn validate(&self, access_credential: &str) -> bool {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("access_token", access_credential)])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(status = %resp.status(), "Token rejected by tokeninfo");
                false
            }
            Err(e) => {
                // Network failures count as invalid; no retry.
                warn!(error = %e, "Token validation request failed");
                false
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutResponse {
    storage_quota: StorageQuota,
}

// Drive encodes int64 values as JSON strings; `limit` is absent for unlimited plans.
#[derive(Debug, Deserialize)]
struct StorageQuota {
    limit: Option<String>,
    usage: Option<String>,
}

/// Reads quota from the Drive `about` resource.
pub struct DriveQuotaProbe {
    client: Client,
    api_url: String,
    fallback_total: u64,
}

impl DriveQuotaProbe {
    /// Create a probe. `fallback_total` is used when Drive reports no limit.
    pub fn new(client: Client, config: &GoogleConfig, fallback_total: u64) -> Self {
        Self {
            client,
            api_url: config.drive_api_url.trim_end_matches('/').to_string(),
            fallback_total,
        }
    }
}

fn parse_quota_field(value: Option<&str>, field: &str) -> Result<Option<u64>> {
    value
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                DocpoolError::BackendUnavailable(format!("remote: invalid quota {field}: {v}"))
            })
        })
        .transpose()
}

#[async_trait]
impl CapacityProbe for DriveQuotaProbe {
    async fn quota(&self, access_credential: &str) -> Result<Quota> {
        let response = self
            .client
            .get(format!("{}/about", self.api_url))
            .query(&[("fields", "storageQuota")])
            .bearer_auth(access_credential)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DocpoolError::BackendUnavailable(format!(
                "remote: quota lookup returned {}",
                response.status()
            )));
        }

        let about: AboutResponse = response.json().await?;
        let used = parse_quota_field(about.storage_quota.usage.as_deref(), "usage")?.unwrap_or(0);
        let total = parse_quota_field(about.storage_quota.limit.as_deref(), "limit")?
            .unwrap_or(self.fallback_total);

        Ok(Quota { used, total })
    }
}

/// Reports the same quota for every credential.
///
/// Used with the local byte store, where there is no remote account to ask.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacityProbe {
    total: u64,
}

impl FixedCapacityProbe {
    /// Create a probe that reports `total` bytes with nothing used.
    pub fn new(total: u64) -> Self {
        Self { total }
    }
}

#[async_trait]
impl CapacityProbe for FixedCapacityProbe {
    async fn quota(&self, _access_credential: &str) -> Result<Quota> {
        Ok(Quota {
            used: 0,
            total: self.total,
        })
    }

    fn reports_usage(&self) -> bool {
        false
    }
}
