//! Redis-backed token store.
//!
//! All gateway instances share one Redis backend, so every instance
//! observes the same records and counters; nothing is cached in-process.
//! The client is constructed once at startup and injected wherever a
//! store is needed.

use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::backend::{StoreError, TokenStore, COUNTER_TTL};
use super::token::{counter_key, token_key, TokenRecord, WindowId};
use crate::config::RedisConfig;

/// Token store backed by a shared Redis instance.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisTokenStore {
    /// Connect to Redis and verify the connection with a `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url())?;
        let conn = ConnectionManager::new(client).await?;

        let store = Self {
            conn,
            timeout: Duration::from_millis(config.timeout_ms),
        };
        store.ping().await?;

        info!(host = %config.host, port = config.port, db = config.db, "Connected to Redis");
        Ok(store)
    }

    /// Run one store call under the configured timeout. Retries, if any,
    /// belong to the connection manager's transport layer, never here.
    async fn call<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn lookup(&self, api_key: &str) -> Result<Option<TokenRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self.call(conn.get(token_key(api_key))).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn increment_window(
        &self,
        api_key: &str,
        window: &WindowId,
    ) -> Result<u64, StoreError> {
        let key = counter_key(api_key, window);
        let mut conn = self.conn.clone();

        let count: u64 = self.call(conn.incr(&key, 1u64)).await?;

        // INCR created the key iff the result is 1; only that caller arms
        // the TTL. A concurrent increment observing count > 1 leaves the
        // entry untouched, so the count itself is never at risk.
        if count == 1 {
            let mut conn = self.conn.clone();
            let _: bool = self
                .call(conn.expire(&key, COUNTER_TTL.as_secs() as i64))
                .await?;
        }

        Ok(count)
    }

    async fn store(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        // No store-level expiry: the gate enforces expires_at itself.
        self.call(conn.set(token_key(&record.api_key), json)).await
    }

    async fn delete(&self, api_key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.call(conn.del(token_key(api_key))).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .call(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }
}
