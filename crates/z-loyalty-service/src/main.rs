//! Z-Loyalty Service - reconciliation daemon for the points ledger.
//!
//! This is the main entry point for the z-loyalty service.

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use z_loyalty_accrual::AccrualClient;
use z_loyalty_engine::Engine;
use z_loyalty_store::{PgStore, Store};

use crate::config::ServiceConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,z_loyalty=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Z-Loyalty Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env()?;

    tracing::info!(
        accrual_address = %config.accrual_address,
        poll_interval_ms = config.engine.poll_interval.as_millis() as u64,
        workers = config.engine.workers,
        queue_capacity = config.engine.queue_capacity,
        "Service configuration loaded"
    );

    // Connect to PostgreSQL and run migrations
    let store = Arc::new(PgStore::connect(&config.database_uri).await?);

    // Start the reconciliation engine
    let source = Arc::new(AccrualClient::new(&config.accrual_address));
    let engine = Engine::new(
        config.engine.clone(),
        Arc::clone(&store) as Arc<dyn Store>,
        source,
    );
    engine.start().await;

    // Run until the process is asked to shut down
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    engine.stop().await;
    store.close().await;

    Ok(())
}
