//! Inbound proxy request
//!
//! Canonicalizes the forwarded path and query into a cache key.

use url::form_urlencoded;

/// A client request to forward: path under `/proxy/` plus query pairs in
/// arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Path forwarded to the upstream, without leading or trailing slashes
    pub path: String,
    /// Query parameters as received
    pub query: Vec<(String, String)>,
}

impl ProxyRequest {
    pub fn new(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        let path = path.into();
        Self {
            path: path.trim_matches('/').to_string(),
            query,
        }
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.segments().next().is_none() {
            return Some("Proxy path cannot be empty".to_string());
        }
        if self.segments().any(|s| s == "." || s == "..") {
            return Some("Proxy path cannot contain '.' or '..' segments".to_string());
        }
        None
    }

    /// Non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Query pairs to forward, minus any client attempt at the reserved key.
    pub fn forwarded_params<'a>(
        &'a self,
        reserved: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k != reserved)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // == Cache Key ==
    /// Escaped `path` plus the forwarded query sorted by name then value, so
    /// parameter order never splits the cache.
    ///
    /// Segments are escaped so a decoded `?`, `&` or `=` inside the path
    /// cannot pass for query syntax.
    pub fn cache_key(&self, reserved: &str) -> String {
        let mut params: Vec<(&str, &str)> = self.forwarded_params(reserved).collect();
        params.sort_unstable();

        let path = self
            .segments()
            .map(|s| form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>())
            .collect::<Vec<_>>()
            .join("/");
        if params.is_empty() {
            return path;
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        format!("{}?{}", path, query)
    }
}
