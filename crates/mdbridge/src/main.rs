//! mdbridge: market-data ingestion bridge binary
//!
//! Starts the bridge runtime and the health server, then waits for a
//! shutdown signal. The native driver shim feeds packets in through
//! `Bridge::on_feed_data`.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mdbridge_core::{run_server, Bridge, BridgeConfig, BridgeStats, ServerState};

#[derive(Parser, Debug)]
#[command(name = "mdbridge")]
#[command(about = "Market-data ingestion bridge")]
struct Args {
    /// Path to the bridge configuration file (defaults apply when omitted)
    #[arg(short, long, env = "MDBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Health server bind address
    #[arg(long, default_value = "0.0.0.0:8080")]
    health_addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    info!(
        broker = %config.broker.host,
        port = config.broker.port,
        "loaded bridge configuration"
    );

    let stats = Arc::new(BridgeStats::default());
    let mut bridge = Bridge::new(config, Arc::clone(&stats));
    bridge.start();

    let health_addr: SocketAddr = args.health_addr.parse()?;
    let state = ServerState::new(bridge.queue(), stats);
    tokio::spawn(async move {
        if let Err(e) = run_server(health_addr, state).await {
            error!(error = %e, "health server failed");
        }
    });
    info!(addr = %health_addr, "health server listening");

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    bridge.stop();
    Ok(())
}
