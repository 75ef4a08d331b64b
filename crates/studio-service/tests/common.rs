//! Common test utilities for studio-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use wiremock::MockServer;

use studio_core::UserId;
use studio_engine::InMemoryAssetSink;
use studio_providers::{FluxQueueClient, LuminaClient, ProviderRegistry, VireoClient};
use studio_service::{create_router, AppState, ServiceConfig};
use studio_store::{LedgerStore, MemoryStore};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Mock vendor API that all three provider adapters point at.
    pub provider: MockServer,
    /// The in-memory store backing the service.
    pub store: Arc<MemoryStore>,
    /// The in-memory asset sink.
    pub sink: Arc<InMemoryAssetSink>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The admin API key for privileged requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh store and mock vendor.
    pub async fn new() -> Self {
        let provider = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(InMemoryAssetSink::new());

        let mut registry = ProviderRegistry::new();
        registry.register(
            "lumina-image-1",
            Arc::new(LuminaClient::new(provider.uri(), "test-key")),
        );
        registry.register(
            "flux-queue-xl",
            Arc::new(FluxQueueClient::new(provider.uri(), "test-key")),
        );
        registry.register(
            "vireo-video-1",
            Arc::new(VireoClient::new(provider.uri(), "test-key")),
        );

        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            admin_api_key: Some(admin_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            registry,
            Arc::clone(&sink) as _,
            config,
        );
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            provider,
            store,
            sink,
            test_user_id,
            admin_api_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }

    /// Put tickets onto the test user's ledger directly.
    pub async fn fund(&self, amount: i64) {
        self.store
            .grant(&self.test_user_id, amount)
            .await
            .expect("Failed to grant tickets");
    }
}
