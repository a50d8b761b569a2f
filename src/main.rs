//! API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (trace, request ID, timeout, concurrency limit)
//!                         │
//!                         ▼
//!                     pipeline::Flow
//!                         │  validate_route ─▶ plugins (on request) ─▶ mock_response
//!                         │  ─▶ upstream ─▶ plugins (on response) ─▶ write_response
//!                         ▼
//!     Client Response ◀── http::response (JSON errors, metrics)      ──▶ Backend
//!
//!     Cross-cutting: config (+ reload), store (resource caches), observability
//!     (tracing, Prometheus, W3C trace context), lifecycle (startup, signals, shutdown)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::{shutdown_signal, Gateway, Shutdown};
use api_gateway::observability::{init_logging, init_metrics};

#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about = "API gateway request pipeline")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not watch the configuration file for changes.
    #[arg(long)]
    no_reload: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        eprintln!("a rustls crypto provider was already installed");
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        mock_responses = config.proxy.mock_responses,
        plugins = %config.plugins.directory,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut gateway = Gateway::build(config)?;
    let reload_path = cli.config.as_deref().filter(|_| !cli.no_reload);
    gateway.watch(reload_path)?;

    let shutdown = Arc::new(Shutdown::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    gateway.serve(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
