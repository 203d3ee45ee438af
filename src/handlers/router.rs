//! Router configuration - centralized route definitions.
//!
//! Routes are split into public (no auth) and protected (token required).
//! The auth middleware and rate limiter are applied by the caller so tests
//! can exercise both layered and bare routers.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::state::AppState;
use super::{assistant, health, history, pendientes, reports};

/// Build the public routes (no authentication required)
///
/// Health probes and metrics must always be reachable for monitoring.
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        .route("/metrics", get(health::metrics_endpoint))
        .with_state(state)
}

/// Build the protected API routes (authentication required)
pub fn build_protected_routes(state: AppState) -> Router {
    Router::new()
        // Assistant analysis
        .route(
            "/api/assistant/activities-with-reviews",
            post(assistant::activities_with_reviews),
        )
        .route("/api/assistant/activities", post(assistant::daily_activities))
        .route("/api/assistant/reviews", post(assistant::activity_reviews))
        // Pendiente state
        .route("/api/assistant/pendientes", post(pendientes::save_pendientes))
        .route(
            "/api/assistant/pendientes/confirm",
            post(pendientes::confirm_estado),
        )
        .route(
            "/api/assistant/validate-explanation",
            post(pendientes::validate_explanation),
        )
        .route(
            "/api/assistant/explanations",
            post(pendientes::save_explanations),
        )
        .route("/api/assistant/next-task", get(pendientes::next_task))
        // Session history
        .route("/api/history/session", get(history::get_session_history))
        .route("/api/history/user", get(history::list_user_histories))
        .route(
            "/api/history/session",
            delete(history::delete_session_history),
        )
        // Reports
        .route("/api/reports/daily", post(reports::generate_daily_report))
        .with_state(state)
}
