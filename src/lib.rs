//! Reel Proxy - caching, rate-limited gateway to a movie metadata API
//!
//! Shields the application from a throttled upstream: responses are cached
//! for a fixed TTL, misses are funnelled through a FIFO scheduler capped at a
//! requests-per-second ceiling, and each upstream call is retried with
//! `Retry-After`-aware linear backoff.
//!
//! Rate limiting is per process. N replicas each run their own cache and
//! scheduler, so the effective upstream rate is `target_rps × N`.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod scheduler;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{ProxyError, Result};
pub use proxy::ProxyService;
pub use tasks::spawn_cleanup_task;
