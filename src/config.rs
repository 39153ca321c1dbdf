//! Configuration module for docpool.

use serde::Deserialize;
use std::path::Path;

use crate::{DocpoolError, Result};

/// Google Drive requires resumable upload chunks to be multiples of 256 KiB.
pub const DRIVE_CHUNK_GRANULARITY: usize = 256 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/docpool.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where document bytes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory per account (development and tests).
    #[default]
    Local,
    /// Google Drive, using each account's access credential.
    Drive,
}

/// Document storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Byte store backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Capacity assumed for an account whose quota cannot be queried, in gigabytes.
    #[serde(default = "default_capacity_gb")]
    pub default_capacity_gb: u64,
    /// Transfer chunk size in kilobytes.
    #[serde(default = "default_chunk_size_kb")]
    pub chunk_size_kb: usize,
}

fn default_local_path() -> String {
    "data/documents".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

fn default_capacity_gb() -> u64 {
    15 // free Google account quota
}

fn default_chunk_size_kb() -> usize {
    2048
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    /// Default account capacity in bytes.
    pub fn default_capacity_bytes(&self) -> u64 {
        self.default_capacity_gb * 1024 * 1024 * 1024
    }

    /// Transfer chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_kb * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_path: default_local_path(),
            max_upload_size_mb: default_max_upload_size(),
            default_capacity_gb: default_capacity_gb(),
            chunk_size_kb: default_chunk_size_kb(),
        }
    }
}

/// Administrator allowlist.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    /// Emails that are classified as administrators on authentication.
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Google API endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    /// Token introspection endpoint.
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,
    /// Drive v3 REST base URL.
    #[serde(default = "default_drive_api_url")]
    pub drive_api_url: String,
    /// Drive v3 upload base URL.
    #[serde(default = "default_drive_upload_url")]
    pub drive_upload_url: String,
    /// Timeout for each remote request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

fn default_drive_api_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            tokeninfo_url: default_tokeninfo_url(),
            drive_api_url: default_drive_api_url(),
            drive_upload_url: default_drive_upload_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// How new uploads are spread across accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// First account in pool order with room.
    #[default]
    FirstFit,
    /// Account whose free space fits the upload most tightly.
    BestFit,
}

/// Storage account pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Interval between credential revalidation sweeps in seconds (0 disables).
    #[serde(default = "default_revalidate_interval")]
    pub revalidate_interval_secs: u64,
    /// Placement policy for new uploads.
    #[serde(default)]
    pub placement: Placement,
}

fn default_revalidate_interval() -> u64 {
    3600
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            revalidate_interval_secs: default_revalidate_interval(),
            placement: Placement::default(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Shared secret used to verify identity provider tokens (HS256).
    #[serde(default)]
    pub jwt_secret: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/docpool.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Document storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Administrator allowlist.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Google API endpoints.
    #[serde(default)]
    pub google: GoogleConfig,
    /// Storage account pool configuration.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DocpoolError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DocpoolError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `DOCPOOL_JWT_SECRET`: Override the JWT secret key
    /// - `DOCPOOL_ADMIN_EMAILS`: Comma-separated administrator emails
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("DOCPOOL_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.auth.jwt_secret = jwt_secret;
            }
        }

        if let Ok(emails) = std::env::var("DOCPOOL_ADMIN_EMAILS") {
            let emails: Vec<String> = emails
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            if !emails.is_empty() {
                self.admin.emails = emails;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The JWT secret is not set
    /// - The drive backend is selected with a chunk size Drive rejects
    /// - A Google endpoint is not an http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(DocpoolError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via DOCPOOL_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }

        let chunk = self.storage.chunk_size_bytes();
        if chunk == 0 {
            return Err(DocpoolError::Config(
                "storage.chunk_size_kb must be positive".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Drive && chunk % DRIVE_CHUNK_GRANULARITY != 0 {
            return Err(DocpoolError::Config(format!(
                "storage.chunk_size_kb must be a multiple of {} for the drive backend",
                DRIVE_CHUNK_GRANULARITY / 1024
            )));
        }

        for (key, value) in [
            ("google.tokeninfo_url", &self.google.tokeninfo_url),
            ("google.drive_api_url", &self.google.drive_api_url),
            ("google.drive_upload_url", &self.google.drive_upload_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| DocpoolError::Config(format!("{key} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DocpoolError::Config(format!("{key} must be an http(s) URL")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.cors_origins.is_empty());

        assert_eq!(config.database.path, "data/docpool.db");

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_path, "data/documents");
        assert_eq!(config.storage.max_upload_size_mb, 100);
        assert_eq!(config.storage.default_capacity_gb, 15);
        assert_eq!(config.storage.chunk_size_kb, 2048);

        assert!(config.admin.emails.is_empty());
        assert_eq!(
            config.google.tokeninfo_url,
            "https://oauth2.googleapis.com/tokeninfo"
        );
        assert_eq!(config.pool.revalidate_interval_secs, 3600);
        assert_eq!(config.pool.placement, Placement::FirstFit);
        assert!(config.auth.jwt_secret.is_empty());

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/docpool.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 3000
cors_origins = ["http://localhost:5173"]

[database]
path = "custom/db.sqlite"

[storage]
backend = "drive"
local_path = "custom/docs"
max_upload_size_mb = 20
default_capacity_gb = 100
chunk_size_kb = 512

[admin]
emails = ["root@example.com", "ops@example.com"]

[google]
tokeninfo_url = "http://localhost:9000/tokeninfo"
drive_api_url = "http://localhost:9000/drive/v3"
drive_upload_url = "http://localhost:9000/upload/drive/v3"
request_timeout_secs = 5

[pool]
revalidate_interval_secs = 0
placement = "best_fit"

[auth]
jwt_secret = "test-secret-key"

[logging]
level = "debug"
file = "custom/logs/app.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);

        assert_eq!(config.database.path, "custom/db.sqlite");

        assert_eq!(config.storage.backend, StorageBackend::Drive);
        assert_eq!(config.storage.local_path, "custom/docs");
        assert_eq!(config.storage.max_upload_bytes(), 20 * 1024 * 1024);
        assert_eq!(
            config.storage.default_capacity_bytes(),
            100 * 1024 * 1024 * 1024
        );
        assert_eq!(config.storage.chunk_size_bytes(), 512 * 1024);

        assert_eq!(config.admin.emails.len(), 2);
        assert_eq!(config.google.request_timeout_secs, 5);
        assert_eq!(config.pool.revalidate_interval_secs, 0);
        assert_eq!(config.pool.placement, Placement::BestFit);
        assert_eq!(config.auth.jwt_secret, "test-secret-key");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/app.log");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[server]
port = 3000

[admin]
emails = ["root@example.com"]
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.admin.emails, vec!["root@example.com"]);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.path, "data/docpool.db");
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "data/docpool.db");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(DocpoolError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_parse_unknown_backend() {
        let result = Config::parse("[storage]\nbackend = \"s3\"\n");
        assert!(matches!(result, Err(DocpoolError::Config(_))));
    }

    #[test]
    fn test_parse_unknown_placement() {
        let result = Config::parse("[pool]\nplacement = \"round_robin\"\n");
        assert!(matches!(result, Err(DocpoolError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");

        assert!(matches!(result, Err(DocpoolError::Io(_))));
    }

    #[test]
    fn test_apply_env_overrides_jwt_secret() {
        let original = std::env::var("DOCPOOL_JWT_SECRET").ok();

        std::env::set_var("DOCPOOL_JWT_SECRET", "env-secret-key");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.auth.jwt_secret, "env-secret-key");

        if let Some(val) = original {
            std::env::set_var("DOCPOOL_JWT_SECRET", val);
        } else {
            std::env::remove_var("DOCPOOL_JWT_SECRET");
        }
    }

    #[test]
    fn test_apply_env_overrides_admin_emails() {
        let original = std::env::var("DOCPOOL_ADMIN_EMAILS").ok();

        std::env::set_var("DOCPOOL_ADMIN_EMAILS", " a@example.com, ,b@example.com ");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.admin.emails, vec!["a@example.com", "b@example.com"]);

        if let Some(val) = original {
            std::env::set_var("DOCPOOL_ADMIN_EMAILS", val);
        } else {
            std::env::remove_var("DOCPOOL_ADMIN_EMAILS");
        }
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = Config::default();

        let result = config.validate();
        if let Err(DocpoolError::Config(msg)) = result {
            assert!(msg.contains("jwt_secret"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_validate_drive_chunk_granularity() {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();
        config.storage.backend = StorageBackend::Drive;
        config.storage.chunk_size_kb = 300;

        assert!(matches!(config.validate(), Err(DocpoolError::Config(_))));

        config.storage.chunk_size_kb = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_google_urls() {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();
        config.google.drive_api_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(DocpoolError::Config(_))));

        config.google.drive_api_url = "ftp://example.com/drive".to_string();
        assert!(matches!(config.validate(), Err(DocpoolError::Config(_))));

        config.google.drive_api_url = "http://127.0.0.1:9000/drive/v3".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_local_any_chunk_size() {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();
        config.storage.chunk_size_kb = 3;

        assert!(config.validate().is_ok());
    }
}
