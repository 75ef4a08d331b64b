//! Application state.

use std::sync::Arc;
use std::time::Duration;

use studio_engine::{AssetSink, EngineSettings, Orchestrator};
use studio_providers::{FluxQueueClient, LuminaClient, ProviderRegistry, VireoClient};
use studio_store::{AssetStore, JobStore, LedgerStore};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The generation orchestrator.
    pub orchestrator: Arc<Orchestrator>,

    /// The ticket ledger store (provision and grant bypass the orchestrator).
    pub ledgers: Arc<dyn LedgerStore>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state over the given stores and registry.
    #[must_use]
    pub fn new(
        ledgers: Arc<dyn LedgerStore>,
        jobs: Arc<dyn JobStore>,
        assets: Arc<dyn AssetStore>,
        registry: ProviderRegistry,
        sink: Arc<dyn AssetSink>,
        config: ServiceConfig,
    ) -> Self {
        let settings = EngineSettings {
            max_inflight: config.max_inflight_jobs,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            job_timeout: Duration::from_secs(config.job_timeout_seconds),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&ledgers),
            jobs,
            assets,
            Arc::new(registry),
            sink,
            config.pricing.clone(),
            settings,
        ));

        Self {
            orchestrator,
            ledgers,
            config,
        }
    }
}

/// Build the provider registry from configured vendor credentials.
///
/// Models whose vendor is not configured are left unregistered; submitting
/// against them fails with a provider-unavailable error.
#[must_use]
pub fn build_registry(config: &ServiceConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    match config
        .lumina_api_url
        .as_ref()
        .zip(config.lumina_api_key.as_ref())
    {
        Some((url, key)) => {
            registry.register(
                "lumina-image-1",
                Arc::new(LuminaClient::new(url.clone(), key.clone())),
            );
            tracing::info!(lumina_url = %url, "Lumina integration enabled");
        }
        None => tracing::warn!("Lumina not configured - lumina-image-1 will be unavailable"),
    }

    match config
        .fluxqueue_api_url
        .as_ref()
        .zip(config.fluxqueue_api_key.as_ref())
    {
        Some((url, key)) => {
            registry.register(
                "flux-queue-xl",
                Arc::new(FluxQueueClient::new(url.clone(), key.clone())),
            );
            tracing::info!(fluxqueue_url = %url, "FluxQueue integration enabled");
        }
        None => tracing::warn!("FluxQueue not configured - flux-queue-xl will be unavailable"),
    }

    match config
        .vireo_api_url
        .as_ref()
        .zip(config.vireo_api_key.as_ref())
    {
        Some((url, key)) => {
            registry.register(
                "vireo-video-1",
                Arc::new(VireoClient::new(url.clone(), key.clone())),
            );
            tracing::info!(vireo_url = %url, "Vireo integration enabled");
        }
        None => tracing::warn!("Vireo not configured - vireo-video-1 will be unavailable"),
    }

    registry
}
