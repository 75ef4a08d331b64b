//! Design Studio Service - HTTP API for generation and tickets
//!
//! This is the main entry point for the studio service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studio_engine::{HttpAssetSink, Reconciler};
use studio_service::{build_registry, create_router, AppState, ServiceConfig};
use studio_store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,studio=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Design Studio Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        asset_dir = %config.asset_dir,
        lumina_configured = %config.lumina_api_url.is_some(),
        fluxqueue_configured = %config.fluxqueue_api_url.is_some(),
        vireo_configured = %config.vireo_api_url.is_some(),
        "Service configuration loaded"
    );

    // Connect to PostgreSQL and ensure the schema exists
    tracing::info!("Connecting to PostgreSQL");
    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.init_schema().await?;

    // Build app state
    let registry = build_registry(&config);
    let sink = Arc::new(HttpAssetSink::new(
        config.asset_dir.clone(),
        config.asset_base_url.clone(),
    ));
    let state = AppState::new(
        Arc::clone(&store) as _,
        Arc::clone(&store) as _,
        store,
        registry,
        sink,
        config.clone(),
    );

    // Start the reconciler sweep loop
    let reconciler = Reconciler::new(
        Arc::clone(&state.orchestrator),
        Duration::from_secs(config.poll_interval_seconds),
    );
    tokio::spawn(reconciler.run());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
