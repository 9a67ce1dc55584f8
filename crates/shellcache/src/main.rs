//! Shellcache - offline caching agent for a web application shell and its audio

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LogFormat, StorageBackend};
use shellcache_api::{AppState, MetricsHandle, create_router};
use shellcache_core::OfflineAgent;
use shellcache_proxy::{Fetcher, HttpFetcher, HttpFetcherConfig};
use shellcache_storage::{CacheStorage, LocalStorage, MemoryStorage};

/// Shellcache - offline caching agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "SHELLCACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "SHELLCACHE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging.level, config.logging.format);

    info!("Starting Shellcache v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage backend
    let storage: Arc<dyn CacheStorage> = match config.storage.backend {
        StorageBackend::Local => {
            tokio::fs::create_dir_all(&config.storage.path).await?;
            Arc::new(LocalStorage::new(&config.storage.path).await?)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; cached entries will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };

    // Initialize network access
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(HttpFetcherConfig {
        origin: Some(config.agent.scope.clone()),
        upstream: config.upstream.url.clone(),
        timeout: config.upstream.timeout(),
        skip_tls_verify: config.upstream.skip_tls_verify,
    })?);

    // Bring the agent up: install the shell, then take control
    let agent = Arc::new(OfflineAgent::new(
        config.agent.clone(),
        storage,
        fetcher.clone(),
    )?);
    agent.install().await.context("Install failed")?;
    agent.activate().await.context("Activation failed")?;

    // Initialize metrics
    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(Arc::new(MetricsHandle::new(handle))),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    // Create router
    let state = AppState::new(agent, fetcher);
    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Scope: {}", config.agent.scope);
    if let Some(upstream) = &config.upstream.url {
        info!("Upstream: {}", upstream);
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return std::future::pending().await;
    }
    info!("Shutdown signal received");
}
