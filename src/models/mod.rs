//! Request and Response models for the proxy
//!
//! This module defines the inbound request shape and the JSON bodies the
//! proxy produces itself (errors, stats, health).

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::ProxyRequest;
pub use responses::{ErrorResponse, HealthResponse, StatsResponse};
