//! In-memory token store.
//!
//! Implements the same observable semantics as the Redis store, including
//! the lazy 60-second window-counter expiry. Suitable for single-instance
//! deployments and tests; a cluster of gateways needs the shared Redis
//! store for quota correctness.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::backend::{StoreError, TokenStore, COUNTER_TTL};
use super::token::{counter_key, token_key, TokenRecord, WindowId};

struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

/// Process-local token store.
pub struct MemoryTokenStore {
    records: DashMap<String, TokenRecord>,
    counters: DashMap<String, WindowCounter>,
    counter_ttl: Duration,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_counter_ttl(COUNTER_TTL)
    }

    /// Create an empty store with a custom counter TTL.
    pub(crate) fn with_counter_ttl(counter_ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            counters: DashMap::new(),
            counter_ttl,
        }
    }

    /// Number of stored token records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn lookup(&self, api_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self
            .records
            .get(&token_key(api_key))
            .map(|r| r.value().clone()))
    }

    async fn increment_window(
        &self,
        api_key: &str,
        window: &WindowId,
    ) -> Result<u64, StoreError> {
        let key = counter_key(api_key, window);
        let now = Instant::now();

        let mut entry = self.counters.entry(key).or_insert_with(|| WindowCounter {
            count: 0,
            expires_at: now + self.counter_ttl,
        });

        // Expiry is applied lazily, the way a store-level TTL would have
        // removed the entry before this increment.
        if now >= entry.expires_at {
            entry.count = 0;
            entry.expires_at = now + self.counter_ttl;
        }

        entry.count += 1;
        Ok(entry.count)
    }

    async fn store(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.records
            .insert(token_key(&record.api_key), record.clone());
        Ok(())
    }

    async fn delete(&self, api_key: &str) -> Result<(), StoreError> {
        self.records.remove(&token_key(api_key));
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
