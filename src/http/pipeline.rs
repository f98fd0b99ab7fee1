//! The request pipeline: Admission Gate, then Dispatcher.
//!
//! Every request outside the operational endpoints flows through
//! [`handle`] in one fixed order: admit, resolve, forward. Rejections
//! short-circuit into the fixed status/body pairs of the external
//! contract, and any store fault fails the request closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{info, warn};

use crate::admission::{AdmissionGate, Rejection};
use crate::metrics::Metrics;
use crate::routing::Dispatcher;
use crate::store::TokenStore;

/// Shared state injected into every handler.
pub struct AppState<S> {
    /// The admission gate
    pub gate: Arc<AdmissionGate<S>>,
    /// Route resolution and forwarding
    pub dispatcher: Arc<Dispatcher>,
    /// Store handle, used by the readiness probe
    pub store: Arc<S>,
    /// Metric instruments
    pub metrics: Arc<Metrics>,
}

// Arc fields make the state cheap to clone for any store type.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            dispatcher: self.dispatcher.clone(),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Gate and dispatch one request.
pub async fn handle<S: TokenStore + 'static>(
    State(state): State<AppState<S>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let path = uri.path().to_string();
    let method_label = method.as_str().to_string();

    state
        .metrics
        .http_requests_total
        .with_label_values(&[&method_label, &path])
        .inc();

    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let response = match state.gate.admit(credential, &path, Utc::now()).await {
        Ok(record) => match state.dispatcher.resolve(&path) {
            Some(target) => {
                info!(api_key = %record.api_key, method = %method_label, path = %path, "request admitted");
                state
                    .dispatcher
                    .forward(
                        target,
                        method,
                        &uri,
                        &headers,
                        body,
                        connect_info.map(|info| info.0),
                    )
                    .await
            }
            None => {
                // Admission passed but no backend is configured for the
                // path; a deployment gap, not an authorization failure.
                warn!(path = %path, "no backend route configured");
                (StatusCode::NOT_FOUND, "No route configured for this path").into_response()
            }
        },
        Err(rejection) => {
            observe_rejection(&state.metrics, rejection);
            render_rejection(rejection)
        }
    };

    let elapsed = started.elapsed();
    state
        .metrics
        .http_request_duration_seconds
        .with_label_values(&[&path])
        .observe(elapsed.as_secs_f64());
    info!(
        method = %method_label,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "request completed"
    );

    response
}

fn observe_rejection(metrics: &Metrics, rejection: Rejection) {
    match rejection {
        Rejection::MissingCredential | Rejection::InvalidCredential => {
            metrics.auth_failures_total.inc()
        }
        Rejection::QuotaExceeded => metrics.rate_limit_hits_total.inc(),
        Rejection::StoreFailure | Rejection::MalformedExpiry => {
            metrics.store_failures_total.inc()
        }
        Rejection::RouteNotAuthorized => {}
    }
}

/// Render a rejection as its contractual status/body pair.
fn render_rejection(rejection: Rejection) -> Response {
    let status =
        StatusCode::from_u16(rejection.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, rejection.to_string()).into_response()
}
