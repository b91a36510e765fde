//! Cache Module
//!
//! Bounded in-memory response cache with fixed TTL expiration and
//! oldest-inserted-first eviction.

mod entry;
mod order;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use order::InsertionOrder;
pub use stats::{CacheStats, Removal};
pub use store::CacheStore;
