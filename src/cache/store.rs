//! Cache Store Module
//!
//! Bounded response cache: HashMap storage, fixed TTL checked lazily on read,
//! oldest-inserted-first eviction once capacity is exceeded.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, InsertionOrder, Removal};

// == Cache Store ==
/// Upstream payloads keyed by canonical request key.
///
/// Not internally synchronized; callers share it behind a lock.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    order: InsertionOrder,
    stats: CacheStats,
    max_entries: usize,
    ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` payloads for `ttl` each.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            stats: CacheStats::new(),
            max_entries,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // == Get ==
    /// Returns the cached payload if present and younger than the TTL.
    ///
    /// An expired entry is dropped and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                let value = entry.value.clone();
                self.stats.record_lookup(true);
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.remove(key);
            self.stats.record_removals(Removal::Expired, 1);
            debug!(key, "cache entry expired");
        }
        self.stats.record_lookup(false);
        None
    }

    // == Put ==
    /// Inserts or overwrites `key`, stamping it with the current instant.
    ///
    /// Once the entry count exceeds capacity the oldest-inserted entry is
    /// evicted.
    pub fn put(&mut self, key: String, value: Value) {
        self.order.record(&key);
        if self.entries.insert(key, CacheEntry::new(value)).is_some() {
            self.stats.record_overwrite();
        }

        while self.entries.len() > self.max_entries {
            match self.order.pop_oldest() {
                Some(evicted) => {
                    self.entries.remove(&evicted);
                    self.stats.record_removals(Removal::Evicted, 1);
                    debug!(key = %evicted, "cache entry evicted");
                }
                None => break,
            }
        }
    }

    /// Whether `key` is stored, regardless of freshness. Does not touch stats.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len(), self.max_entries)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            self.remove(&key);
        }

        self.stats.record_removals(Removal::Expired, count);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.remove(key);
    }
}
