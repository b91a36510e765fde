//! Upstream HTTP client.
//!
//! Builds upstream URLs (injecting the server-side API key), performs single
//! GET attempts, and classifies failures for the retry loop.

use std::time::Duration;

use reqwest::{header::RETRY_AFTER, header::HeaderMap, Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::retry::{with_retry, RetryPolicy};
use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::models::ProxyRequest;

/// Longest slice of an upstream error body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the upstream movie metadata API.
pub struct UpstreamClient {
    http: Client,
    base_url: Url,
    api_key: String,
    api_key_param: String,
    retry: RetryPolicy,
}

impl UpstreamClient {
    /// Creates a client; `timeout` bounds every individual HTTP attempt.
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        api_key_param: impl Into<String>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ProxyError::InvalidConfig(format!(
                "upstream base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            api_key_param: api_key_param.into(),
            retry,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.base_url()?,
            config.upstream_api_key.clone(),
            config.api_key_param.clone(),
            RetryPolicy::new(config.max_attempts, config.retry_base_delay())
                .with_max_retry_after(config.max_retry_after_duration()),
            config.upstream_timeout_duration(),
        )
    }

    /// Name of the query parameter reserved for the server-side secret.
    pub fn api_key_param(&self) -> &str {
        &self.api_key_param
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // == Build URL ==
    /// `{base}/{path}?{client params minus the reserved key}&{key param}={secret}`
    pub fn build_url(&self, request: &ProxyRequest) -> Result<Url> {
        if let Some(reason) = request.validate() {
            return Err(ProxyError::InvalidRequest(reason));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProxyError::Internal("upstream base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(request.segments());

        url.query_pairs_mut()
            .extend_pairs(request.forwarded_params(&self.api_key_param))
            .append_pair(&self.api_key_param, &self.api_key);

        Ok(url)
    }

    // == Fetch Once ==
    /// Performs one GET and classifies the outcome.
    pub async fn fetch_once(&self, url: &Url) -> Result<Value> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProxyError::Network(e.without_url().to_string()))?;

        let status = response.status();
        debug!(path = url.path(), status = status.as_u16(), "upstream responded");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProxyError::UpstreamThrottled {
                retry_after: parse_retry_after(response.headers()),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            } else {
                body.chars().take(MAX_ERROR_BODY_CHARS).collect()
            };
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProxyError::InvalidPayload(e.without_url().to_string()))
    }

    // == Fetch With Retry ==
    /// Fetches `url`, retrying per the configured policy.
    pub async fn fetch_with_retry(&self, url: &Url) -> Result<Value> {
        with_retry(&self.retry, |_| self.fetch_once(url)).await
    }
}

/// Reads a `Retry-After` header given in whole seconds.
///
/// HTTP-date values and garbage yield `None`, falling back to computed backoff.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
