//! API Handlers
//!
//! HTTP request handlers for each proxy endpoint.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{
        header::{HeaderName, CACHE_CONTROL},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::models::{HealthResponse, ProxyRequest, StatsResponse};
use crate::proxy::ProxyService;

/// Response header reporting whether the payload came from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyService>,
}

impl AppState {
    /// Creates a new AppState around an already built service.
    pub fn new(proxy: ProxyService) -> Self {
        Self {
            proxy: Arc::new(proxy),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ProxyService::init(config)?))
    }
}

/// Handler for GET /proxy/*path
///
/// Forwards the path and query (minus the reserved key parameter) to the
/// upstream API through the cache and scheduler. Successful responses carry
/// `X-Cache` and a CDN `Cache-Control` directive.
pub async fn proxy_handler(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response> {
    // Extractor failures get the same JSON error body as every other failure
    let Path(path) = path.map_err(|e| ProxyError::InvalidRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| ProxyError::InvalidRequest(e.body_text()))?;
    let request = ProxyRequest::new(path, query);

    let fetched = state.proxy.fetch(&request).await.map_err(|e| {
        warn!(path = %request.path, error = %e, "proxy request failed");
        e
    })?;

    let cache_control = HeaderValue::from_str(state.proxy.cache_control())
        .map_err(|e| ProxyError::Internal(format!("invalid Cache-Control value: {}", e)))?;

    let mut response = Json(fetched.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        X_CACHE,
        HeaderValue::from_static(fetched.cache_status.as_str()),
    );
    headers.insert(CACHE_CONTROL, cache_control);

    Ok(response)
}

/// Handler for OPTIONS /proxy/*path
///
/// The CORS headers are attached by the router; the preflight has no body.
pub async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.proxy.cache().read().await.stats();
    let scheduler = state.proxy.scheduler().snapshot();

    Json(StatsResponse::new(cache, scheduler))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
