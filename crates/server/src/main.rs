use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contentgate_core::{
    load_config, load_config_or_default, validate_config, Config, ConfigError, ConsumerLifecycle,
    ContentRules, SqliteSubmissionStore, SubmissionService, SubmissionStore, SystemClock,
};
use contentgate_server::{api::create_router, state::AppState};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "CONTENTGATE_CONFIG";

/// Config file used when `CONTENTGATE_CONFIG` is unset. Optional.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // An explicitly named config file must exist; the default one is optional.
    let (config_path, loaded) = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let path = PathBuf::from(path);
            let loaded = load_config(&path);
            (path, loaded)
        }
        Err(_) => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            let loaded = load_config_or_default(&path);
            (path, loaded)
        }
    };

    // Initialize logging before reporting config errors
    init_tracing(&loaded);

    let config = loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Transport backend: {}", config.processor.backend.as_str());
    info!("Database path: {:?}", config.database.path);

    // Create SQLite submission store
    let store: Arc<dyn SubmissionStore> = Arc::new(
        open_store(&config.database.path).context("Failed to create submission store")?,
    );
    info!("Submission store initialized");

    // Built-in content rules
    let rules = ContentRules::from_config(&config.validator)
        .context("Failed to build content rules")?;
    info!(
        "Content rules: min length {}, pattern {:?}",
        rules.min_length(),
        config.validator.required_pattern
    );

    // Create transport
    let lifecycle = Arc::new(
        ConsumerLifecycle::from_config(
            &config,
            Arc::clone(&store),
            Arc::new(rules),
            Arc::new(SystemClock),
        )
        .context("Failed to create transport")?,
    );

    // A consumer that cannot start does not block intake; new submissions
    // stay PENDING until a consumer picks them up.
    if let Err(e) = lifecycle.start().await {
        warn!("Consumer failed to start, serving intake only: {}", e);
    }

    let submissions = SubmissionService::new(store).with_producer(lifecycle.producer());

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        submissions,
        Arc::clone(&lifecycle),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            lifecycle.shutdown().await;
            return Err(e).with_context(|| format!("Failed to bind to {}", addr));
        }
    };

    // Run server with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Server shutting down...");
    lifecycle.shutdown().await;
    info!("Consumer stopped");

    served.context("Server error")
}

/// `RUST_LOG` wins; otherwise the configured level, or `info` when the
/// config could not be loaded.
fn init_tracing(config: &Result<Config, ConfigError>) {
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=debug", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_store(path: &Path) -> Result<SqliteSubmissionStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }
    Ok(SqliteSubmissionStore::new(path)?)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
