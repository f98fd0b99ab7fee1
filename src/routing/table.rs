//! Ordered prefix-to-backend route table.

use crate::config::RouteConfig;

/// The upstream service address an admitted request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    base_url: String,
}

impl BackendTarget {
    /// Create a target from a base URL, e.g. `http://backend:8081`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The target's base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full upstream URL for a request path (including query string).
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }
}

/// One route table entry.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Path prefix this entry matches
    pub path_prefix: String,
    /// Backend the matched requests are forwarded to
    pub target: BackendTarget,
}

/// Ordered route table, loaded once from configuration and immutable for
/// the process lifetime.
///
/// Resolution is explicit first-match in registration order, NOT longest
/// prefix: with overlapping prefixes the earlier entry wins, and that
/// behavior is externally observable.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the configured route list, preserving order.
    pub fn from_config(routes: &[RouteConfig]) -> Self {
        let mut table = Self::new();
        for route in routes {
            table.register(&route.path, BackendTarget::new(&route.host));
        }
        table
    }

    /// Append an entry. Registration order is match order.
    pub fn register(&mut self, path_prefix: impl Into<String>, target: BackendTarget) {
        self.entries.push(RouteEntry {
            path_prefix: path_prefix.into(),
            target,
        });
    }

    /// Resolve a path to a backend target; first matching prefix wins.
    pub fn resolve(&self, path: &str) -> Option<&BackendTarget> {
        self.entries
            .iter()
            .find(|entry| path.starts_with(&entry.path_prefix))
            .map(|entry| &entry.target)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matches_prefix() {
        let mut table = RouteTable::new();
        table.register("/api/v1/", BackendTarget::new("http://backend:8081"));

        let target = table.resolve("/api/v1/users/42").unwrap();
        assert_eq!(target.base_url(), "http://backend:8081");
    }

    #[test]
    fn test_resolve_unmatched_path_is_none() {
        let mut table = RouteTable::new();
        table.register("/api/v1/", BackendTarget::new("http://backend:8081"));

        assert!(table.resolve("/admin/metrics").is_none());
    }

    #[test]
    fn test_first_match_wins_over_longer_prefix() {
        let mut table = RouteTable::new();
        table.register("/api/", BackendTarget::new("http://general:8081"));
        table.register("/api/v1/", BackendTarget::new("http://specific:8082"));

        // Registration order decides, not prefix length.
        let target = table.resolve("/api/v1/x").unwrap();
        assert_eq!(target.base_url(), "http://general:8081");
    }

    #[test]
    fn test_from_config_preserves_order() {
        let routes = vec![
            crate::config::RouteConfig {
                path: "/api/v1/".to_string(),
                host: "http://backend-a:8081".to_string(),
            },
            crate::config::RouteConfig {
                path: "/api/".to_string(),
                host: "http://backend-b:8082".to_string(),
            },
        ];
        let table = RouteTable::from_config(&routes);

        assert_eq!(table.len(), 2);
        let target = table.resolve("/api/v1/users").unwrap();
        assert_eq!(target.base_url(), "http://backend-a:8081");
    }

    #[test]
    fn test_target_url_for_keeps_path_and_query() {
        let target = BackendTarget::new("http://backend:8081/");
        assert_eq!(
            target.url_for("/api/v1/users?page=2"),
            "http://backend:8081/api/v1/users?page=2"
        );
    }
}
