//! API Module
//!
//! HTTP handlers and routing for the proxy.
//!
//! # Endpoints
//! - `GET /proxy/*path` - Proxy a request to the upstream API
//! - `OPTIONS /proxy/*path` - CORS preflight
//! - `GET /stats` - Cache and scheduler statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
