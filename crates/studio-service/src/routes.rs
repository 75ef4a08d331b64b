//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{generations, health, tickets};
use crate::state::AppState;

/// Maximum concurrent requests for generation endpoints.
/// Polling clients hit the status routes every few seconds.
const GENERATION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Tickets (JWT auth)
/// - `POST /v1/tickets/provision` - Create a zero-balance ledger
/// - `GET /v1/tickets/balance` - Get balance figures
/// - `POST /v1/tickets/grant` - Add tickets (admin key auth)
///
/// ## Generations (JWT auth, own concurrency limit)
/// - `POST /v1/generations` - Start a generation
/// - `POST /v1/generations/estimate` - Price without starting
/// - `GET /v1/generations/active` - Non-terminal jobs (reload recovery)
/// - `GET /v1/generations/recent` - Terminal jobs since a given instant
/// - `GET /v1/generations/:id` - One job with its assets
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Generation routes get their own concurrency limit: status polling
    // dominates traffic once a few async jobs are in flight.
    let generation_routes = Router::new()
        .route("/", post(generations::start_generation))
        .route("/estimate", post(generations::estimate_cost))
        .route("/active", get(generations::list_active))
        .route("/recent", get(generations::list_recent))
        .route("/:id", get(generations::get_job))
        .layer(ConcurrencyLimitLayer::new(GENERATION_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Tickets
        .route("/tickets/provision", post(tickets::provision))
        .route("/tickets/balance", get(tickets::get_balance))
        .route("/tickets/grant", post(tickets::grant_tickets))
        // Generations (with their own concurrency limit)
        .nest("/generations", generation_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
