//! Payout worker binary
//!
//! Wires the engine, dispatcher, and broadcast bus together and runs until
//! interrupted. The external rail is the in-process mock provider until a
//! production rail adapter is configured.

use ledger_core::{EventRecord, Store};
use message_bus::BroadcastBus;
use payout_engine::{Config, MockPayoutProvider, PayoutEngine, PayoutService};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting PayRail payout worker");

    // Load configuration
    let config = Config::from_env()?;

    // Wire storage, fan-out, and the provider
    let store = Arc::new(Store::new());
    let bus: Arc<BroadcastBus<EventRecord>> = Arc::new(BroadcastBus::new(1024));
    let provider = Arc::new(MockPayoutProvider::new());
    tracing::warn!("Mock payout provider wired; external calls stay in-process");

    let engine = Arc::new(PayoutEngine::new(store, provider, bus, config.clone())?);
    let service = PayoutService::start(engine, &config);

    tracing::info!("Payout worker ready");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down payout worker");
    service.shutdown().await;

    Ok(())
}
