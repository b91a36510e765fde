//! Cache Statistics Module
//!
//! Counters describing how well the cache is shielding the upstream.

use serde::Serialize;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// TTL elapsed, noticed on read or by the background sweep
    Expired,
    /// Dropped as the oldest insertion once capacity was exceeded
    Evicted,
}

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to the upstream (absent or expired)
    pub misses: u64,
    /// Writes that replaced a payload still held for the same key
    pub overwrites: u64,
    pub expirations: u64,
    pub evictions: u64,
    /// Entries held when the snapshot was taken
    pub total_entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns hits / (hits + misses), or 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn record_lookup(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_overwrite(&mut self) {
        self.overwrites += 1;
    }

    pub fn record_removals(&mut self, reason: Removal, count: usize) {
        let counter = match reason {
            Removal::Expired => &mut self.expirations,
            Removal::Evicted => &mut self.evictions,
        };
        *counter += count as u64;
    }

    /// Copy of the counters stamped with the store's current occupancy.
    pub fn snapshot(&self, total_entries: usize, capacity: usize) -> Self {
        Self {
            total_entries,
            capacity,
            ..self.clone()
        }
    }
}
