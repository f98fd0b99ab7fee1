//! Token store trait for abstracting the shared key-value backend.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::token::{TokenRecord, WindowId};

/// Store-level TTL armed on a window counter at its first increment.
pub const COUNTER_TTL: Duration = Duration::from_secs(60);

/// Errors surfaced by a token store implementation.
///
/// Every variant is an infrastructure fault from the admission gate's
/// perspective; the gate fails the request closed on any of them.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation
    #[error("store backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// The call did not complete within the configured timeout
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A stored token record could not be decoded
    #[error("malformed token record: {0}")]
    MalformedRecord(#[from] serde_json::Error),
}

/// Trait for token store implementations.
///
/// This trait abstracts over the Redis-backed production store and the
/// in-memory store so the admission gate and the HTTP pipeline can work
/// with either.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the record for an API key. A missing key is `Ok(None)`, not an
    /// error; only backend faults and corrupt values are `Err`.
    async fn lookup(&self, api_key: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Atomically increment the counter for `(api_key, window)` and return
    /// the post-increment value. The first increment for a window identity
    /// arms [`COUNTER_TTL`] on the entry as part of the same logical
    /// operation; losing a race to arm the TTL must not corrupt the count.
    async fn increment_window(&self, api_key: &str, window: &WindowId)
        -> Result<u64, StoreError>;

    /// Write a token record. Administrative path, used by the issuance
    /// tool; never called while serving requests.
    async fn store(&self, record: &TokenRecord) -> Result<(), StoreError>;

    /// Delete a token record. Administrative path.
    async fn delete(&self, api_key: &str) -> Result<(), StoreError>;

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
