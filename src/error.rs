//! Error types for the proxy
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Proxy Error Enum ==
/// Unified error type for the proxy.
///
/// Cloneable so a single upstream outcome can be handed to every caller
/// waiting on a coalesced request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    /// Upstream answered 429
    #[error("Upstream throttled the request (retry after {retry_after:?})")]
    UpstreamThrottled { retry_after: Option<Duration> },

    /// Upstream answered with any other non-success status
    #[error("Upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level failure (DNS, connection reset, timeout)
    #[error("Network failure: {0}")]
    Network(String),

    /// Upstream answered 2xx with a body that is not JSON
    #[error("Invalid upstream payload: {0}")]
    InvalidPayload(String),

    /// Every attempt failed
    #[error("Upstream request failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<ProxyError> },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unusable configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Server-supplied wait hint, only present on throttling responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProxyError::UpstreamThrottled { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether another attempt against the upstream may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamThrottled { .. }
                | ProxyError::Upstream { .. }
                | ProxyError::Network(_)
                | ProxyError::InvalidPayload(_)
        )
    }

    fn summary(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) => "Invalid proxy request",
            ProxyError::InvalidConfig(_) | ProxyError::Internal(_) => "Internal proxy error",
            _ => "Failed to fetch from upstream API",
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.summary(), self.to_string()));

        let mut response = (status, body).into_response();
        // Not the TTL directive successes carry: a CDN must never pin a failure.
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;
