//! Tether server.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                     TETHER                       │
//!                       │                                                  │
//!   Client frames       │  ┌──────────┐   ┌───────────┐   ┌────────────┐   │
//!   ────────────────────┼─▶│   net    │──▶│ protocol  │──▶│  handler   │   │
//!   header\r\npayload   │  │ listener │   │  state +  │   │ (by kind)  │   │
//!                       │  │ transport│   │  codec    │   └────────────┘   │
//!                       │  └────┬─────┘   └─────┬─────┘                    │
//!                       │       │ add/remove    │ update_activity          │
//!                       │       ▼               ▼                          │
//!                       │  ┌─────────────────────────┐   ┌──────────────┐  │
//!                       │  │  registry (single task) │◀──│   liveness   │  │
//!                       │  └─────────────────────────┘   │   monitor    │  │
//!                       │                                └──────────────┘  │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use tether::config::{load_config, ServerConfig};
use tether::lifecycle::signals::shutdown_signal;
use tether::observability::{logging, metrics};
use tether::Server;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Framed-message TCP server with idle connection eviction", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    logging::init(&config.observability);
    tracing::info!("tether v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        idle_timeout_secs = config.monitor.idle_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match Server::new(config).start().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            return Err(e.into());
        }
    };

    server.run_until(shutdown_signal()).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
