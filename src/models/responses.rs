//! Response DTOs produced by the proxy itself
//!
//! Upstream payloads pass through untouched; these cover errors, stats and
//! health.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::scheduler::SchedulerSnapshot;

/// Error response body returned when a request cannot be served.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Short summary of what failed
    pub error: String,
    /// Human-readable failure reason
    pub details: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub scheduler: SchedulerSnapshot,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, scheduler: SchedulerSnapshot) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            scheduler,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
