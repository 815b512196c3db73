//! HTTP server implementation using Axum.

use crate::handlers::{handle_all_downloads, handle_downloads, handle_health};
use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use jgl_metrics::{Aggregator, MetricsCache};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

/// Budget for handling a single inbound request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across handlers.
pub struct AppState {
    /// Read-through cache of upstream counts
    pub cache: Arc<MetricsCache>,
    /// Tracked packages reported by the aggregate endpoint
    pub aggregator: Aggregator,
}

/// Build the router with all routes and middleware.
pub fn router(cache: Arc<MetricsCache>, aggregator: Aggregator) -> Router {
    let state = Arc::new(AppState { cache, aggregator });

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            client_ip = %client_ip(request.headers(), peer),
        )
    });

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/downloads", get(handle_all_downloads))
        .route("/api/downloads/:source/:package", get(handle_downloads))
        .layer(
            ServiceBuilder::new()
                .layer(trace)
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the bound address (useful when port=0) and the handle of the
/// server task, which finishes once `shutdown` resolves and in-flight
/// requests complete.
pub async fn start_server(
    cache: Arc<MetricsCache>,
    aggregator: Aggregator,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<(SocketAddr, JoinHandle<anyhow::Result<()>>)> {
    let app = router(cache, aggregator);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;
        Ok(())
    });

    Ok((actual_addr, handle))
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Originating client address: the first `X-Forwarded-For` hop if a proxy set
/// one, otherwise the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
