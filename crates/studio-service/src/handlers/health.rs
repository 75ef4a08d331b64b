//! Health check handler.

use axum::Json;

/// Health check endpoint.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "studio-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
