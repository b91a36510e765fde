//! Proxy Module
//!
//! Composes cache, scheduler and upstream client into the request flow:
//! cache check, then queue, dispatch and retry on a miss, then cache write.

mod in_flight;
mod service;

pub use in_flight::{InFlight, Joined, LeaderGuard};
pub use service::{CacheStatus, Fetched, ProxyService};
