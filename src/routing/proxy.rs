//! Forwarding of admitted requests to their resolved backend.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use super::table::{BackendTarget, RouteTable};

/// Hop-by-hop headers are connection-scoped and never forwarded in either
/// direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Resolves admitted requests against the route table and forwards them.
///
/// The dispatcher performs no retries and passes backend responses through
/// unmodified, whatever their status. Only a transport-level failure to
/// reach the backend produces a gateway-originated `502`.
pub struct Dispatcher {
    table: RouteTable,
    client: reqwest::Client,
}

impl Dispatcher {
    /// Create a dispatcher over a route table with the given upstream
    /// call timeout.
    pub fn new(table: RouteTable, upstream_timeout: Duration) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(upstream_timeout)
            .build()?;
        Ok(Self { table, client })
    }

    /// Resolve a path to a backend target; first matching prefix wins.
    pub fn resolve(&self, path: &str) -> Option<&BackendTarget> {
        self.table.resolve(path)
    }

    /// Forward one admitted request to `target` and relay the backend's
    /// status, headers, and body back unmodified.
    pub async fn forward(
        &self,
        target: &BackendTarget,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
        client_addr: Option<SocketAddr>,
    ) -> Response {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        let url = target.url_for(path_and_query);

        debug!(url = %url, method = %method, "forwarding to backend");

        let outbound = forward_headers(headers, client_addr);
        let result = self
            .client
            .request(method, url.as_str())
            .headers(outbound)
            .body(body)
            .send()
            .await;

        let upstream = match result {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(url = %url, error = %e, "backend call failed");
                return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
            }
        };

        let mut builder = axum::http::Response::builder().status(upstream.status());
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }

        match builder.body(Body::from_stream(upstream.bytes_stream())) {
            Ok(response) => response,
            Err(e) => {
                error!(url = %url, error = %e, "failed to relay backend response");
                (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
            }
        }
    }
}

/// Build the outgoing header map: original headers minus host, length, and
/// hop-by-hop entries, plus the forwarding headers carrying the original
/// host, originating client address, and originating scheme.
fn forward_headers(headers: &HeaderMap, client_addr: Option<SocketAddr>) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(headers.len() + 3);

    for (name, value) in headers {
        if is_hop_by_hop(name) || *name == header::HOST || *name == header::CONTENT_LENGTH {
            continue;
        }
        outbound.append(name, value.clone());
    }

    if let Some(host) = headers.get(header::HOST) {
        outbound.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
    }
    if let Some(addr) = client_addr {
        if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
            outbound.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }
    outbound.insert(
        HeaderName::from_static("x-forwarded-proto"),
        HeaderValue::from_static("http"),
    );

    outbound
}
