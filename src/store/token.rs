//! Token record and rate-window identity types.

use chrono::{DateTime, ParseError, Utc};
use serde::{Deserialize, Serialize};

/// An issued credential as persisted in the shared store.
///
/// Records are written once by the issuance tool and never mutated by the
/// gateway. Expiry is enforced by the admission gate, not by a store-level
/// TTL, so `expires_at` is kept as the stored RFC 3339 string: a corrupt
/// value is detected at expiry-check time and classified as a store fault
/// rather than failing deserialization of the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque API key, also the lookup key
    pub api_key: String,
    /// Maximum requests admitted per fixed one-minute window
    pub rate_limit: u64,
    /// Absolute expiry instant, RFC 3339 UTC
    pub expires_at: String,
    /// Path patterns this key may access; exact match or trailing-`*` prefix
    pub allowed_routes: Vec<String>,
}

impl TokenRecord {
    /// Parse the stored expiry timestamp.
    pub fn expiry(&self) -> Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(&self.expires_at).map(|t| t.with_timezone(&Utc))
    }

    /// Check whether `path` is authorized by any of the allowed route
    /// patterns. Matching is case-sensitive; any single match suffices.
    pub fn allows_route(&self, path: &str) -> bool {
        self.allowed_routes
            .iter()
            .any(|pattern| pattern_matches(pattern, path))
    }
}

/// A pattern ending in `*` matches any path sharing its fixed prefix;
/// any other pattern must match the path exactly.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => path.starts_with(prefix),
        None => pattern == path,
    }
}

/// Identity of one fixed calendar-minute rate window.
///
/// Windows are `[minute, minute+1)` in UTC and shared by every gateway
/// instance, so the identity is the UTC timestamp truncated to whole
/// minutes, rendered as `YYYYMMDDHHMM`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowId(String);

impl WindowId {
    /// The window containing the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(now.format("%Y%m%d%H%M").to_string())
    }

    /// The window identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store key for a token record.
pub(crate) fn token_key(api_key: &str) -> String {
    format!("token:{}", api_key)
}

/// Store key for one `(api_key, window)` counter.
pub(crate) fn counter_key(api_key: &str, window: &WindowId) -> String {
    format!("ratelimit:{}:{}", api_key, window)
}
