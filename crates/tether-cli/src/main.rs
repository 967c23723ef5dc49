//! # Tether
//!
//! Connects to a channel server, joins the configured topics and logs
//! everything that arrives.
//!
//! ## Usage
//!
//! ```bash
//! # Run with tether.toml from the default locations
//! tether
//!
//! # Run with a specific config file
//! tether /path/to/tether.toml
//!
//! # Override the socket URL
//! TETHER_URL=ws://localhost:4000/socket/websocket tether
//! ```

mod config;
mod handler;
mod metrics;

use anyhow::Result;
use tether_core::{Client, StopReason};
use tether_transport::WebSocketTransport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handler::TetherHandler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    tracing::info!(
        topics = ?config.topics,
        serializer = ?config.transport.serializer,
        "Starting tether against {}",
        config.url
    );

    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    let transport = WebSocketTransport::new(config.websocket_config());
    let options = config.client_options();
    let client = Client::<TetherHandler>::start(config, transport, options)?;

    let handle = client.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            let _ = handle.stop(StopReason::Shutdown("interrupted".to_string()));
        }
    });

    let reason = client.wait().await?;
    tracing::info!(%reason, "Client stopped");

    Ok(())
}
