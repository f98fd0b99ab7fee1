//! Per-request admission decision.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{TokenRecord, TokenStore, WindowId};

/// Classified rejection of one request.
///
/// The `Display` text of each variant is the exact response body the
/// gateway sends for it; the pairing is part of the external contract.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No credential was presented
    #[error("Unauthorized: API key is missing")]
    MissingCredential,

    /// Unknown or expired credential; deliberately indistinguishable so a
    /// caller cannot probe whether a key exists
    #[error("Unauthorized: Invalid API key")]
    InvalidCredential,

    /// The credential does not authorize the requested path
    #[error("Route not allowed for this token")]
    RouteNotAuthorized,

    /// The fixed-window quota for this key is exhausted
    #[error("Rate limit exceeded")]
    QuotaExceeded,

    /// The backing store was unreachable or an operation on it failed
    #[error("Internal Server Error")]
    StoreFailure,

    /// The stored expiry timestamp could not be parsed; data corruption,
    /// distinct from a legitimate expiry
    #[error("Internal Server Error: Invalid token expiry format")]
    MalformedExpiry,
}

impl Rejection {
    /// HTTP status code for this rejection.
    pub fn status(&self) -> u16 {
        match self {
            Rejection::MissingCredential | Rejection::InvalidCredential => 401,
            Rejection::RouteNotAuthorized => 403,
            Rejection::QuotaExceeded => 429,
            Rejection::StoreFailure | Rejection::MalformedExpiry => 500,
        }
    }

    /// Whether the caller caused this rejection. Infrastructure faults are
    /// the complement; those fail the request closed.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, Rejection::StoreFailure | Rejection::MalformedExpiry)
    }
}

/// The admission gate: decides for every inbound request whether it may
/// reach a backend.
///
/// Each call performs exactly one token lookup and, when the checks reach
/// the quota stage, exactly one counter increment. Checks run in a fixed
/// order and the first failing check wins.
pub struct AdmissionGate<S> {
    store: Arc<S>,
}

impl<S: TokenStore> AdmissionGate<S> {
    /// Create a gate over the given token store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Evaluate one request.
    ///
    /// `credential` is the raw `Authorization` header value, if present; a
    /// `Bearer ` prefix is stripped before lookup. `path` is the request
    /// path and `now` the evaluation instant, injected so windows and
    /// expiry are deterministic under test.
    pub async fn admit(
        &self,
        credential: Option<&str>,
        path: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, Rejection> {
        let api_key = match credential {
            Some(raw) => raw.strip_prefix("Bearer ").unwrap_or(raw),
            None => return Err(Rejection::MissingCredential),
        };
        if api_key.is_empty() {
            return Err(Rejection::MissingCredential);
        }

        let record = match self.store.lookup(api_key).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Rejection::InvalidCredential),
            Err(e) => {
                warn!(error = %e, "token lookup failed");
                return Err(Rejection::StoreFailure);
            }
        };

        let expiry = match record.expiry() {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!(api_key = %record.api_key, error = %e, "stored expiry is not RFC 3339");
                return Err(Rejection::MalformedExpiry);
            }
        };
        if now >= expiry {
            debug!(api_key = %record.api_key, "credential expired");
            return Err(Rejection::InvalidCredential);
        }

        if !record.allows_route(path) {
            debug!(api_key = %record.api_key, path = %path, "route not authorized");
            return Err(Rejection::RouteNotAuthorized);
        }

        let window = WindowId::at(now);
        let count = match self.store.increment_window(&record.api_key, &window).await {
            Ok(count) => count,
            Err(e) => {
                warn!(api_key = %record.api_key, error = %e, "counter increment failed");
                return Err(Rejection::StoreFailure);
            }
        };
        if count > record.rate_limit {
            debug!(
                api_key = %record.api_key,
                count = count,
                limit = record.rate_limit,
                window = %window,
                "quota exceeded"
            );
            return Err(Rejection::QuotaExceeded);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTokenStore, StoreError};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 14, 9, 30).unwrap()
    }

    fn record(api_key: &str, rate_limit: u64, routes: &[&str]) -> TokenRecord {
        TokenRecord {
            api_key: api_key.to_string(),
            rate_limit,
            // Well past any test instant.
            expires_at: "2030-01-01T00:00:00Z".to_string(),
            allowed_routes: routes.iter().map(|r| r.to_string()).collect(),
        }
    }

    async fn gate_with(records: &[TokenRecord]) -> AdmissionGate<MemoryTokenStore> {
        let store = MemoryTokenStore::new();
        for record in records {
            store.store(record).await.unwrap();
        }
        AdmissionGate::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_missing_credential_rejected() {
        let gate = gate_with(&[]).await;
        let outcome = gate.admit(None, "/api/v1/users/42", now()).await;
        assert_eq!(outcome.unwrap_err(), Rejection::MissingCredential);
    }

    #[tokio::test]
    async fn test_empty_credential_rejected() {
        let gate = gate_with(&[]).await;
        assert_eq!(
            gate.admit(Some(""), "/x", now()).await.unwrap_err(),
            Rejection::MissingCredential
        );
        assert_eq!(
            gate.admit(Some("Bearer "), "/x", now()).await.unwrap_err(),
            Rejection::MissingCredential
        );
    }

    #[tokio::test]
    async fn test_unknown_credential_rejected() {
        let gate = gate_with(&[]).await;
        let outcome = gate.admit(Some("nope"), "/api/v1/users/42", now()).await;
        assert_eq!(outcome.unwrap_err(), Rejection::InvalidCredential);
    }

    #[tokio::test]
    async fn test_bearer_prefix_stripped_before_lookup() {
        let gate = gate_with(&[record("abc", 5, &["/api/v1/users/*"])]).await;
        let admitted = gate
            .admit(Some("Bearer abc"), "/api/v1/users/42", now())
            .await
            .unwrap();
        assert_eq!(admitted.api_key, "abc");
    }

    #[tokio::test]
    async fn test_raw_credential_accepted_without_prefix() {
        let gate = gate_with(&[record("abc", 5, &["/api/v1/users/*"])]).await;
        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_credential_indistinguishable_from_unknown() {
        let mut expired = record("old", 5, &["/api/v1/users/*"]);
        expired.expires_at = "2020-01-01T00:00:00Z".to_string();
        let gate = gate_with(&[expired]).await;

        // Route and quota would pass; expiry wins first.
        let outcome = gate.admit(Some("old"), "/api/v1/users/42", now()).await;
        assert_eq!(outcome.unwrap_err(), Rejection::InvalidCredential);
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let mut record = record("edge", 5, &["/api/v1/users/*"]);
        record.expires_at = "2025-03-07T14:09:30Z".to_string();
        let gate = gate_with(&[record]).await;

        // Invalid at exactly expires_at.
        let outcome = gate.admit(Some("edge"), "/api/v1/users/42", now()).await;
        assert_eq!(outcome.unwrap_err(), Rejection::InvalidCredential);
    }

    #[tokio::test]
    async fn test_malformed_expiry_is_a_store_fault() {
        let mut corrupt = record("bad", 5, &["/api/v1/users/*"]);
        corrupt.expires_at = "tomorrow-ish".to_string();
        let gate = gate_with(&[corrupt]).await;

        let rejection = gate
            .admit(Some("bad"), "/api/v1/users/42", now())
            .await
            .unwrap_err();
        assert_eq!(rejection, Rejection::MalformedExpiry);
        assert!(!rejection.is_client_fault());
    }

    #[tokio::test]
    async fn test_unauthorized_route_rejected() {
        let gate = gate_with(&[record("abc", 5, &["/api/v1/users/*"])]).await;
        let outcome = gate.admit(Some("abc"), "/api/v1/products/1", now()).await;
        assert_eq!(outcome.unwrap_err(), Rejection::RouteNotAuthorized);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_within_one_window() {
        let gate = gate_with(&[record("abc", 1, &["/api/v1/users/*"])]).await;

        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", now())
            .await
            .is_ok());
        // Count becomes 2 > 1 inside the same UTC minute.
        let second = gate.admit(Some("abc"), "/api/v1/users/42", now()).await;
        assert_eq!(second.unwrap_err(), Rejection::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_quota_resets_in_next_window() {
        let gate = gate_with(&[record("abc", 1, &["/api/v1/users/*"])]).await;
        let first_window = now();
        let next_window = Utc.with_ymd_and_hms(2025, 3, 7, 14, 10, 0).unwrap();

        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", first_window)
            .await
            .is_ok());
        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", first_window)
            .await
            .is_err());
        // A saturated counter in window W has no effect on W+1.
        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", next_window)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_five_admits_then_quota_exceeded() {
        let gate = gate_with(&[record("abc", 5, &["/api/v1/orders/*"])]).await;

        for _ in 0..5 {
            let outcome = gate.admit(Some("abc"), "/api/v1/orders/list", now()).await;
            assert!(outcome.is_ok());
        }
        let sixth = gate.admit(Some("abc"), "/api/v1/orders/list", now()).await;
        assert_eq!(sixth.unwrap_err(), Rejection::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_rejection_before_quota_does_not_consume_quota() {
        let gate = gate_with(&[record("abc", 1, &["/api/v1/users/*"])]).await;

        // A route rejection happens before the increment.
        for _ in 0..3 {
            let outcome = gate.admit(Some("abc"), "/api/v1/products/1", now()).await;
            assert_eq!(outcome.unwrap_err(), Rejection::RouteNotAuthorized);
        }
        assert!(gate
            .admit(Some("abc"), "/api/v1/users/42", now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_admitted_record_is_returned() {
        let gate = gate_with(&[record("abc", 5, &["/api/v1/users/*"])]).await;
        let admitted = gate
            .admit(Some("abc"), "/api/v1/users/42", now())
            .await
            .unwrap();
        assert_eq!(admitted.rate_limit, 5);
        assert_eq!(admitted.allowed_routes, vec!["/api/v1/users/*"]);
    }

    /// Store stub whose every operation fails, for fail-closed coverage.
    struct FailingStore;

    #[async_trait::async_trait]
    impl TokenStore for FailingStore {
        async fn lookup(&self, _: &str) -> Result<Option<TokenRecord>, StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(100)))
        }
        async fn increment_window(
            &self,
            _: &str,
            _: &WindowId,
        ) -> Result<u64, StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(100)))
        }
        async fn store(&self, _: &TokenRecord) -> Result<(), StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(100)))
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(100)))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Timeout(std::time::Duration::from_millis(100)))
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let gate = AdmissionGate::new(Arc::new(FailingStore));
        let rejection = gate
            .admit(Some("abc"), "/api/v1/users/42", now())
            .await
            .unwrap_err();
        assert_eq!(rejection, Rejection::StoreFailure);
        assert!(!rejection.is_client_fault());
    }

    #[test]
    fn test_rejection_status_and_body_contract() {
        let cases = [
            (Rejection::MissingCredential, 401, "Unauthorized: API key is missing"),
            (Rejection::InvalidCredential, 401, "Unauthorized: Invalid API key"),
            (Rejection::RouteNotAuthorized, 403, "Route not allowed for this token"),
            (Rejection::QuotaExceeded, 429, "Rate limit exceeded"),
            (Rejection::StoreFailure, 500, "Internal Server Error"),
            (
                Rejection::MalformedExpiry,
                500,
                "Internal Server Error: Invalid token expiry format",
            ),
        ];
        for (rejection, status, body) in cases {
            assert_eq!(rejection.status(), status);
            assert_eq!(rejection.to_string(), body);
        }
    }
}
