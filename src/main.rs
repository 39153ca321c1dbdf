use tracing::{error, info};

use docpool::web::{build_app_state, WebServer};
use docpool::{Config, Database};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = docpool::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        docpool::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> docpool::Result<()> {
    config.validate()?;

    info!("docpool starting");
    info!(
        backend = ?config.storage.backend,
        admins = config.admin.emails.len(),
        "Server configured on {}:{}",
        config.server.host,
        config.server.port
    );

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::open(&config.database.path).await?;

    let state = build_app_state(&config, db)?;
    WebServer::new(&config, state)?.run().await?;
    Ok(())
}
