//! Web server for docpool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::auth::{AdminPolicy, IdentityResolver};
use crate::config::{Config, StorageBackend};
use crate::document::{ByteStore, DocumentService, DriveByteStore, LocalByteStore};
use crate::pool::{
    build_http_client, policy_for, AccountPool, CapacityProbe, DriveQuotaProbe,
    FixedCapacityProbe, GoogleTokenValidator,
};
use crate::{Database, DocpoolError, Result};

use super::handlers::AppState;
use super::middleware::JwtState;
use super::router::{create_health_router, create_router};

/// Wire the services for the configured storage backend.
pub fn build_app_state(config: &Config, db: Database) -> Result<AppState> {
    let client = build_http_client(&config.google)?;
    let validator = Arc::new(GoogleTokenValidator::new(client.clone(), &config.google));
    let default_total = config.storage.default_capacity_bytes();

    let probe: Arc<dyn CapacityProbe>;
    let store: Arc<dyn ByteStore>;
    match config.storage.backend {
        StorageBackend::Drive => {
            probe = Arc::new(DriveQuotaProbe::new(
                client.clone(),
                &config.google,
                default_total,
            ));
            store = Arc::new(DriveByteStore::new(
                client,
                &config.google,
                config.storage.chunk_size_bytes(),
            ));
        }
        StorageBackend::Local => {
            probe = Arc::new(FixedCapacityProbe::new(default_total));
            store = Arc::new(
                LocalByteStore::new(&config.storage.local_path)?
                    .with_chunk_size(config.storage.chunk_size_bytes()),
            );
        }
    }
    tracing::info!(backend = ?config.storage.backend, "Storage backend configured");

    let pool = Arc::new(
        AccountPool::new(db.clone(), validator, probe)
            .with_policy(policy_for(config.pool.placement))
            .with_default_total(default_total),
    );
    tracing::info!(policy = pool.policy_name(), "Placement policy configured");
    let documents = Arc::new(
        DocumentService::new(db.clone(), pool.clone(), store)
            .with_max_upload_bytes(config.storage.max_upload_bytes()),
    );
    let identity = IdentityResolver::new(db.clone(), AdminPolicy::new(&config.admin.emails));

    Ok(AppState::new(db, identity, pool, documents))
}

/// Start the periodic account revalidation task.
///
/// An interval of zero disables it.
pub fn start_revalidation_task(
    pool: Arc<AccountPool>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Periodic account revalidation disabled");
        return None;
    }

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;

            match pool.revalidate_all().await {
                Ok(report) => {
                    if report.deactivated.is_empty() {
                        tracing::debug!(checked = report.checked, "Storage accounts revalidated");
                    } else {
                        tracing::warn!(
                            checked = report.checked,
                            deactivated = ?report.deactivated,
                            "Deactivated storage accounts with failing credentials"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to revalidate storage accounts");
                }
            }
        }
    });

    tracing::info!(interval_secs, "Account revalidation task started");
    Some(handle)
}

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
    /// Largest accepted upload.
    max_upload_bytes: u64,
    /// Seconds between revalidation sweeps.
    revalidate_interval_secs: u64,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| DocpoolError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state: Arc::new(JwtState::new(&config.auth.jwt_secret)),
            cors_origins: config.server.cors_origins.clone(),
            max_upload_bytes: config.storage.max_upload_bytes(),
            revalidate_interval_secs: config.pool.revalidate_interval_secs,
        })
    }

    /// Server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn bind(self) -> std::io::Result<(TcpListener, axum::Router)> {
        start_revalidation_task(self.app_state.pool.clone(), self.revalidate_interval_secs);

        let router = create_router(
            self.app_state,
            self.jwt_state,
            &self.cors_origins,
            self.max_upload_bytes,
        )
        .merge(create_health_router());

        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        Ok((listener, router))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.bind().await?;
        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
