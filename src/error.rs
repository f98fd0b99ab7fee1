//! Error types for the Turnstile gateway.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upstream HTTP client errors
    #[error("Upstream client error: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Metrics registry errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
