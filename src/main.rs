//! Proxy hot reload server.
//!
//! Serves the reverse-proxy routes described by a route file and reinstalls
//! them whenever the file changes.
//!
//! ```text
//!   Client Request
//!   ──────────────▶ request id ─▶ trace ─▶ timeout ─▶ hot reload ─▶ dispatch chain ──▶ upstream
//!                                                          │               │
//!                                                 first request:       no match
//!                                                 load routes,             │
//!                                                 start watcher            ▼
//!                                                                   status / 404
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_hot_reload::config::loader::{load_server_config, ConfigError};
use proxy_hot_reload::config::validation::validate_server_config;
use proxy_hot_reload::config::ServerConfig;
use proxy_hot_reload::observability::{logging, metrics};
use proxy_hot_reload::HttpServer;

#[derive(Parser)]
#[command(name = "proxy-hot-reload")]
#[command(about = "Reverse proxy whose routes reload when the route file changes", long_about = None)]
struct Cli {
    /// Server configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route file to watch; overrides `reload.routes_path`.
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Bind address; overrides `listener.bind_address`.
    #[arg(short, long)]
    listen: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_server_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(routes) = &self.routes {
            config.reload.routes_path = routes.clone();
        }
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }

        validate_server_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.server_config()?;

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "proxy-hot-reload starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes_path = %config.reload.routes_path.display(),
        key_order = ?config.reload.key_order,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config);
    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await
        }
    }
}
