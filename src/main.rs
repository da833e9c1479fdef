//! Socket server (v1)
//!
//! Accepts raw TCP connections on one port per configured application and
//! serves each as HTTP or as a WebSocket session.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client            ┌──────────────────────────────────────────────────┐
//!     ──────────────────┼─▶ net::Acceptor ──▶ security (IP) ──▶ request    │
//!                       │                                       reader     │
//!                       │                                         │        │
//!                       │                         security (URL) ◀┘        │
//!                       │                                │                 │
//!                       │               ┌────────────────┴──────────┐      │
//!                       │               ▼                           ▼      │
//!                       │        websocket session           http chain    │
//!                       │        (read loop task)            ─▶ content    │
//!     ◀─────────────────┼──────────────────────────────────────  pipeline  │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use socket_server::config::load_or_default;
use socket_server::lifecycle::{self, Registry};
use socket_server::observability::{logging, metrics};

/// Time open connections get to finish after shutdown.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "socket-server", version, about = "Plugin-extensible socket server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "server.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(&cli.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(config = %cli.config.display(), "socket-server v0.1.0 starting");
    if !cli.config.exists() {
        tracing::warn!(config = %cli.config.display(), "Configuration file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        plugins = config.plugins.len(),
        handlers = config.handlers.len(),
        max_frame_size = config.websocket.max_frame_size,
        "Configuration loaded"
    );

    let server = lifecycle::start(&config, Arc::new(Registry::with_builtins())).await?;

    lifecycle::wait_for_signal().await;
    server.shutdown();
    server.join(DRAIN_DEADLINE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
