//! Prometheus metrics for the gateway.
//!
//! Metrics observe admitted and rejected outcomes; they never influence
//! the admission decision.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Metric registry and the gateway's instruments, created once at startup.
pub struct Metrics {
    registry: Registry,
    /// Total HTTP requests received
    pub http_requests_total: IntCounterVec,
    /// Histogram of request durations
    pub http_request_duration_seconds: HistogramVec,
    /// Requests blocked due to rate limiting
    pub rate_limit_hits_total: IntCounter,
    /// Failed credential validations
    pub auth_failures_total: IntCounter,
    /// Requests failed closed on store faults
    pub store_failures_total: IntCounter,
}

impl Metrics {
    /// Create and register all gateway metrics.
    pub fn new() -> crate::error::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["method", "path"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Histogram of request durations",
            ),
            &["path"],
        )?;
        let rate_limit_hits_total = IntCounter::new(
            "rate_limit_hits_total",
            "Total requests blocked due to rate limiting",
        )?;
        let auth_failures_total = IntCounter::new(
            "auth_failures_total",
            "Total number of failed token validations",
        )?;
        let store_failures_total = IntCounter::new(
            "store_failures_total",
            "Total requests failed closed on store faults",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(rate_limit_hits_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(store_failures_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            rate_limit_hits_total,
            auth_failures_total,
            store_failures_total,
        })
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render(&self) -> crate::error::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
