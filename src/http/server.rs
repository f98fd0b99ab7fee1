//! HTTP server wiring for the gateway.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info, warn};

use super::pipeline::{self, AppState};
use crate::error::Result;
use crate::store::TokenStore;

/// HTTP server for the gateway pipeline and its operational endpoints.
pub struct HttpServer<S> {
    addr: SocketAddr,
    state: AppState<S>,
}

impl<S: TokenStore + 'static> HttpServer<S> {
    /// Create a new server bound to the given address.
    pub fn new(addr: SocketAddr, state: AppState<S>) -> Self {
        Self { addr, state }
    }

    /// Build the router: operational endpoints as fixed routes, everything
    /// else falls through to the gated pipeline.
    pub fn router(state: AppState<S>) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready::<S>))
            .route("/metrics", get(metrics::<S>))
            .fallback(pipeline::handle::<S>)
            .with_state(state)
    }

    /// Start the server with graceful shutdown.
    ///
    /// The server stops accepting connections when the provided signal
    /// resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = Self::router(self.state);

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            crate::error::GatewayError::Io(e)
        })
    }
}

/// `GET /health` — liveness probe.
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /ready` — readiness probe; verifies the token store is reachable.
async fn ready<S: TokenStore + 'static>(State(state): State<AppState<S>>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "Ready").into_response(),
        Err(e) => {
            warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Store unavailable").into_response()
        }
    }
}

/// `GET /metrics` — Prometheus text exposition.
async fn metrics<S: TokenStore + 'static>(State(state): State<AppState<S>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}
