//! Configuration Module
//!
//! Handles loading and validating proxy configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{ProxyError, Result};

/// Longest accepted cache TTL (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Values are read once at startup and never change afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream movie metadata API
    pub upstream_base_url: String,
    /// Secret injected into every upstream request
    pub upstream_api_key: String,
    /// Query parameter name carrying the secret (never accepted from clients)
    pub api_key_param: String,
    /// Upstream requests-per-second ceiling enforced by the scheduler
    pub target_rps: f64,
    /// Cache TTL in seconds
    pub cache_ttl: u64,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Attempts per upstream call, including the first
    pub max_attempts: u32,
    /// Linear backoff unit in milliseconds
    pub retry_base_delay_ms: u64,
    /// Ceiling applied to upstream `Retry-After` hints, in seconds
    pub max_retry_after: u64,
    /// Per-request timeout of the upstream HTTP client, in seconds
    pub upstream_timeout: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Coalesce concurrent misses for the same key into one upstream call
    pub dedupe_in_flight: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_BASE_URL` - Upstream API base (default: https://api.example.com)
    /// - `UPSTREAM_API_KEY` - Upstream secret (default: empty, rejected by `validate`)
    /// - `UPSTREAM_API_KEY_PARAM` - Secret query parameter name (default: apiKey)
    /// - `RATE_LIMIT_RPS` - Upstream requests per second (default: 10)
    /// - `CACHE_TTL` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `MAX_RETRIES` - Attempts per upstream call (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - Backoff unit in milliseconds (default: 1000)
    /// - `MAX_RETRY_AFTER` - Cap on upstream `Retry-After` hints in seconds (default: 60)
    /// - `UPSTREAM_TIMEOUT` - Upstream request timeout in seconds (default: 10)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `DEDUPE_IN_FLIGHT` - Coalesce identical concurrent misses (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or(defaults.upstream_base_url),
            upstream_api_key: env::var("UPSTREAM_API_KEY").unwrap_or(defaults.upstream_api_key),
            api_key_param: env::var("UPSTREAM_API_KEY_PARAM").unwrap_or(defaults.api_key_param),
            target_rps: env_or("RATE_LIMIT_RPS", defaults.target_rps),
            cache_ttl: env_or("CACHE_TTL", defaults.cache_ttl),
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            max_attempts: env_or("MAX_RETRIES", defaults.max_attempts),
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            max_retry_after: env_or("MAX_RETRY_AFTER", defaults.max_retry_after),
            upstream_timeout: env_or("UPSTREAM_TIMEOUT", defaults.upstream_timeout),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            dedupe_in_flight: env_or("DEDUPE_IN_FLIGHT", defaults.dedupe_in_flight),
        }
    }

    /// Rejects configurations the proxy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.upstream_api_key.is_empty() {
            return Err(ProxyError::InvalidConfig(
                "UPSTREAM_API_KEY must be set".to_string(),
            ));
        }
        if self.api_key_param.is_empty() {
            return Err(ProxyError::InvalidConfig(
                "UPSTREAM_API_KEY_PARAM cannot be empty".to_string(),
            ));
        }
        self.base_url()?;
        if !self.target_rps.is_finite() || self.target_rps <= 0.0 {
            return Err(ProxyError::InvalidConfig(format!(
                "RATE_LIMIT_RPS must be a positive number, got {}",
                self.target_rps
            )));
        }
        self.dispatch_interval()?;
        if self.max_entries == 0 {
            return Err(ProxyError::InvalidConfig(
                "CACHE_MAX_ENTRIES must be at least 1".to_string(),
            ));
        }
        if self.cache_ttl == 0 || self.cache_ttl > MAX_CACHE_TTL_SECS {
            return Err(ProxyError::InvalidConfig(format!(
                "CACHE_TTL must be between 1 and {} seconds, got {}",
                MAX_CACHE_TTL_SECS, self.cache_ttl
            )));
        }
        if self.max_attempts == 0 {
            return Err(ProxyError::InvalidConfig(
                "MAX_RETRIES must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses the upstream base URL, requiring an absolute http(s) URL.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.upstream_base_url).map_err(|e| {
            ProxyError::InvalidConfig(format!(
                "UPSTREAM_BASE_URL '{}' is not a valid URL: {}",
                self.upstream_base_url, e
            ))
        })?;
        match url.scheme() {
            "http" | "https" if !url.cannot_be_a_base() => Ok(url),
            _ => Err(ProxyError::InvalidConfig(format!(
                "UPSTREAM_BASE_URL '{}' must be an http(s) URL",
                self.upstream_base_url
            ))),
        }
    }

    /// Minimum spacing between upstream dispatches, `1 / target_rps` seconds.
    pub fn dispatch_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(1.0 / self.target_rps).map_err(|e| {
            ProxyError::InvalidConfig(format!(
                "RATE_LIMIT_RPS {} gives an unusable dispatch interval: {}",
                self.target_rps, e
            ))
        })
    }

    pub fn cache_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn max_retry_after_duration(&self) -> Duration {
        Duration::from_secs(self.max_retry_after)
    }

    pub fn upstream_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://api.example.com".to_string(),
            upstream_api_key: String::new(),
            api_key_param: "apiKey".to_string(),
            target_rps: 10.0,
            cache_ttl: 300,
            max_entries: 1000,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            max_retry_after: 60,
            upstream_timeout: 10,
            server_port: 3000,
            cleanup_interval: 60,
            dedupe_in_flight: false,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
