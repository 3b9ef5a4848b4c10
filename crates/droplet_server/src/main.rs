//! Droplet server — signaling and presence for browser-to-browser file
//! transfer.

mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use droplet_signal::{SignalConfig, SignalHub, supervisor};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,droplet_server=debug,droplet_signal=debug")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config_path = std::env::var_os("DROPLET_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("droplet.json"));
    let config = SignalConfig::load_or_default(&config_path);
    info!(
        "Starting {} signaling server on {}",
        config.app_name, config.listen_addr
    );

    let hub = Arc::new(Mutex::new(SignalHub::new(config)));
    let (shutdown_tx, _) = broadcast::channel(8);

    let supervisor_task = tokio::spawn(supervisor::run(
        Arc::clone(&hub),
        shutdown_tx.subscribe(),
    ));

    let server_hub = Arc::clone(&hub);
    let server_shutdown = shutdown_tx.subscribe();
    let server_task = tokio::spawn(async move {
        if let Err(e) = transport::start_server(server_hub, server_shutdown).await {
            error!("WebSocket server error: {e}");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());
    let _ = server_task.await;
    let _ = supervisor_task.await;

    Ok(())
}
