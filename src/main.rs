//! Jornada server entry point.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::info;

use jornada::config::ServerConfig;
use jornada::handlers::{build_protected_routes, build_public_routes, AppContext};
use jornada::{auth, metrics, middleware};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    metrics::register_metrics().expect("failed to register metrics");

    info!("Starting Jornada server...");

    let server_config = ServerConfig::from_env();
    server_config.log();

    let context = Arc::new(AppContext::new(server_config.clone())?);

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(server_config.rate_limit_per_second)
        .burst_size(server_config.rate_limit_burst)
        .finish()
        .expect("failed to build governor rate limiter configuration");
    let governor_layer = GovernorLayer::new(governor_conf);

    info!(
        "Rate limiting enabled: {} req/sec, burst of {}",
        server_config.rate_limit_per_second, server_config.rate_limit_burst
    );

    let cors = server_config.cors.to_layer();

    // Protected API routes: token auth + rate limiting.
    // Public routes (health, metrics) carry neither.
    let protected_routes = build_protected_routes(context.clone())
        .layer(axum::middleware::from_fn(auth::auth_middleware))
        .layer(governor_layer);

    let public_routes = build_public_routes(context.clone());

    let app = axum::Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(ConcurrencyLimitLayer::new(
            server_config.max_concurrent_requests,
        ))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Handle graceful shutdown on SIGINT/SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
