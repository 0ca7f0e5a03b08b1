use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mongodeck::config::{self, ConfigBuilder};
use mongodeck::observability::init_observability;
use mongodeck::server::{self, AppState};
use mongodeck::store::{InMemoryConnectionStore, InMemoryHistoryStore};
use mongodeck::{ConnectionCache, MongoClientFactory};

#[derive(Parser, Debug)]
#[command(name = "mongodeck")]
#[command(about = "HTTP backend for browsing and editing MongoDB deployments", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "MONGODECK_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    host: Option<IpAddr>,

    /// HTTP bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Allowed CORS origin
    #[arg(long)]
    cors_origin: Option<String>,

    /// Close cached clients idle for longer than this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Seconds between idle sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Seconds allowed for building a client, handshake included
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// CLI values form the base layer; file and environment override them
    fn into_builder(self) -> ConfigBuilder {
        let mut builder = ConfigBuilder::new().json_logs(self.json_logs);

        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if self.cors_origin.is_some() {
            builder = builder.cors_origin(self.cors_origin);
        }
        if let Some(secs) = self.idle_timeout {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.sweep_interval {
            builder = builder.sweep_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.connect_timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if self.verbose {
            builder = builder.log_level("debug".to_string());
        }
        builder
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = Args::parse();
    let config_path = args.config.take();

    // Load configuration with precedence: env > file > CLI > defaults
    let base = args.into_builder();
    let builder = match config_path {
        Some(ref path) => config::load_config_from_path(path, base)?,
        None => config::load_config(base)?,
    };
    let config = builder.build()?;

    init_observability(&config.observability)?;

    let factory = MongoClientFactory::new().with_connect_timeout(config.cache.connect_timeout);
    let cache = ConnectionCache::with_policy(factory, config.cache);
    let state = AppState::new(
        cache.clone(),
        Arc::new(InMemoryConnectionStore::new()),
        Arc::new(InMemoryHistoryStore::new()),
        config.gateway,
    );

    // Log startup info
    tracing::info!("Starting mongodeck {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Client idle timeout: {:?}, sweep interval: {:?}",
        config.cache.idle_timeout,
        config.cache.sweep_interval
    );
    tracing::info!(
        "Connect timeout: {:?}, close timeout: {:?}",
        config.cache.connect_timeout,
        config.cache.close_timeout
    );
    tracing::info!(
        "Page size: default {}, max {}",
        config.gateway.default_limit,
        config.gateway.max_limit
    );
    tracing::info!(
        "Authentication: {}",
        if config.auth.is_jwt_mode() {
            "jwt"
        } else {
            "static tokens"
        }
    );

    // Setup shutdown signal
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    let result = server::run(&config.server, state, config.auth.clone(), shutdown).await;

    // Close every cached client and stop the sweeper
    cache.shutdown().await;
    tracing::info!("Client cache drained");

    result.map_err(Into::into)
}
