//! Health and infrastructure handlers.

use axum::{extract::State, http::StatusCode, response::Json};

use super::state::AppState;
use crate::metrics;

/// Health response for the main health endpoint
#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub gemini_configured: bool,
    pub groq_pool_size: usize,
}

/// Main health check endpoint
pub async fn health(
    State(state): State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        gemini_configured: state.config.gemini_api_key.is_some(),
        groq_pool_size: state.config.groq_api_keys.len(),
    })
}

/// Liveness probe - minimal check, always succeeds if reachable
pub async fn health_live() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Readiness probe - the stores open at startup, so reachable means ready
pub async fn health_ready() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ready",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> String {
    metrics::gather()
}
