//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};

/// Main configuration for the Turnstile gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token store configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Upstream forwarding configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Ordered route table entries, matched first-prefix-wins
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            upstream: UpstreamConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    9000
}

/// Connection settings for the shared Redis store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis host
    #[serde(default = "default_redis_host")]
    pub host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Redis logical database
    #[serde(default)]
    pub db: i64,

    /// Redis password (empty for unauthenticated instances)
    #[serde(default)]
    pub password: String,

    /// Per-call timeout in milliseconds; a timed-out call is a store failure
    #[serde(default = "default_store_timeout")]
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            password: String::new(),
            timeout_ms: default_store_timeout(),
        }
    }
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_store_timeout() -> u64 {
    1000
}

impl RedisConfig {
    /// Build the connection URL for the redis client.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// Upstream forwarding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Timeout for a proxied backend call, in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_upstream_timeout(),
        }
    }
}

fn default_upstream_timeout() -> u64 {
    30
}

/// A single route table entry: requests whose path starts with `path` are
/// forwarded to the backend at `host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path prefix to match
    pub path: String,
    /// Backend base URL, e.g. `http://backend:8081`
    pub host: String,
}

impl GatewayConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::GatewayError::Config(e.to_string()))?;
        Ok(config)
    }
}
