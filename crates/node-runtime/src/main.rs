//! # Block-Sync Node
//!
//! Entry point: load configuration, initialise logging, run until Ctrl+C.
//!
//! ## Environment
//!
//! - `SYNC_CONFIG` - path of a TOML config file
//! - `SYNC_LISTEN_ADDR`, `SYNC_PEERS`, `SYNC_LOG_LEVEL` - overrides
//! - `RUST_LOG` - log filter, takes precedence over the configured level

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level {:?}", level))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load().context("Failed to load configuration")?;
    init_logging(&config.log_level)?;

    info!("===========================================");
    info!("  Block-Sync Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let runtime = NodeRuntime::new(config);
    let addr = runtime.start().await?;
    info!("Peers: {} configured, listening on {}", runtime.config().peers.len(), addr);

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
