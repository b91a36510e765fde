//! Upstream Module
//!
//! HTTP access to the movie metadata API with bounded, 429-aware retries.

mod client;
mod retry;

pub use client::{parse_retry_after, UpstreamClient};
pub use retry::{with_retry, RetryPolicy};
