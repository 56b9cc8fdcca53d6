//! LeadRelay - campaign engine entry point

use anyhow::Result;
use leadrelay_common::config::Config;
use leadrelay_core::{CampaignManager, ChannelSet, Dispatcher};
use leadrelay_storage::db::DatabasePool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; the log filter comes from it
    let config = Config::load()?;
    init_logging(&config.logging.filter);

    info!("Starting LeadRelay campaign engine...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Channel adapters
    let channels = Arc::new(ChannelSet::from_config(&config.whatsapp, &config.smtp)?);

    // Campaign manager
    let manager = CampaignManager::new(
        db_pool.pool().clone(),
        channels.clone(),
        config.dispatcher.max_attempts,
    );

    // Start the dispatcher
    let dispatcher = Arc::new(Dispatcher::new(
        db_pool.pool().clone(),
        channels.clone(),
        config.dispatcher.clone(),
    ));
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run().await;
    });

    // Start API server
    let api_handle = {
        let db_pool = db_pool.clone();
        let api_port = config.api.port;
        tokio::spawn(async move {
            let app = leadrelay_api::create_router(db_pool, manager);
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", api_port))
                .await
                .expect("Failed to bind API server");
            info!("Starting API server on port {}", api_port);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {}", e);
            }
        })
    };

    info!("LeadRelay started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    dispatcher_handle.abort();
    api_handle.abort();

    info!("LeadRelay shutdown complete");

    Ok(())
}

fn init_logging(filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter.to_string()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
