use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::logger::init_logger;
use common::time::{Clock, SystemClock};
use gateway::{AppConfig, HoldService, serve};
use hold::HoldManager;
use hold::broadcast::BroadcastHub;
use hold::sweeper::spawn_expiry_sweeper;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::parse();
    init_logger("hold-gateway", cfg.use_json_logs());

    tracing::info!("Starting hold gateway...");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hub = Arc::new(BroadcastHub::new(cfg.room_channel_capacity));
    let holds = Arc::new(HoldManager::new(cfg.hold_config(), Arc::clone(&hub), Arc::clone(&clock)));

    let sweeper = spawn_expiry_sweeper(Arc::clone(&holds), cfg.sweep_interval());

    let listener = TcpListener::bind(cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;

    let service = Arc::new(HoldService::new(holds, hub, clock));

    tokio::select! {
        res = serve(listener, service) => res?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
        }
    }

    sweeper.abort();
    Ok(())
}
