//! # Feed Cache
//!
//! Memoizes feed results so a burst of route assessments does not hit the
//! same upstream API once per route.
//!
//! Recency is tracked with a logical clock (a monotonic counter) and entries
//! live in a `BTreeMap`, so eviction order never depends on hashing. Expiry
//! uses wall time, passed in by the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::feeds::RiskDataPoint;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Default number of cached feed results.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Default number of entries evicted when the cache is full.
pub const DEFAULT_EVICTION_BATCH: usize = 16;

/// Default lifetime of a cached result in seconds.
pub const DEFAULT_TTL_SECS: i64 = 300;

// =============================================================================
// KEYS
// =============================================================================

/// Which feed a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    TradeNews,
    Political,
    PortCongestion,
}

/// Feed plus the scope it was queried with (region, port code, limit).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedKey {
    pub feed: Feed,
    pub scope: String,
}

impl FeedKey {
    pub fn new(feed: Feed, scope: Option<&str>) -> Self {
        Self {
            feed,
            scope: scope.map(str::to_lowercase).unwrap_or_default(),
        }
    }

    /// Key that also encodes a result limit.
    pub fn limited(feed: Feed, scope: Option<&str>, limit: usize) -> Self {
        let mut key = Self::new(feed, scope);
        key.scope = format!("{}#{limit}", key.scope);
        key
    }
}

// =============================================================================
// ENTRY
// =============================================================================

#[derive(Debug, Clone)]
struct Slot {
    points: Vec<RiskDataPoint>,
    stored_at: DateTime<Utc>,
    last_access: u64,
}

// =============================================================================
// CACHE
// =============================================================================

/// TTL-bounded LRU cache of feed results.
#[derive(Debug)]
pub struct FeedCache {
    slots: BTreeMap<FeedKey, Slot>,
    max_size: usize,
    eviction_batch: usize,
    ttl: Duration,
    logical_clock: u64,
    hits: u64,
    misses: u64,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, Duration::seconds(DEFAULT_TTL_SECS))
    }
}

impl FeedCache {
    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            slots: BTreeMap::new(),
            max_size: max_size.max(1),
            eviction_batch: DEFAULT_EVICTION_BATCH,
            ttl,
            logical_clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    #[must_use]
    pub fn with_eviction_batch(mut self, batch_size: usize) -> Self {
        self.eviction_batch = batch_size.max(1);
        self
    }

    fn tick(&mut self) -> u64 {
        self.logical_clock = self.logical_clock.saturating_add(1);
        self.logical_clock
    }

    /// Cached points for `key`, if present and younger than the TTL.
    ///
    /// Expired entries are dropped and count as misses.
    pub fn get(&mut self, key: &FeedKey, now: DateTime<Utc>) -> Option<Vec<RiskDataPoint>> {
        let stamp = self.tick();
        let ttl = self.ttl;

        match self.slots.get_mut(key) {
            Some(slot) if now - slot.stored_at < ttl => {
                slot.last_access = stamp;
                self.hits = self.hits.saturating_add(1);
                Some(slot.points.clone())
            }
            Some(_) => {
                self.slots.remove(key);
                self.misses = self.misses.saturating_add(1);
                None
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                None
            }
        }
    }

    /// Store a result, evicting the least recently used batch when full.
    pub fn insert(&mut self, key: FeedKey, points: Vec<RiskDataPoint>, now: DateTime<Utc>) {
        let stamp = self.tick();
        if self.slots.len() >= self.max_size && !self.slots.contains_key(&key) {
            self.evict();
        }
        self.slots.insert(
            key,
            Slot {
                points,
                stored_at: now,
                last_access: stamp,
            },
        );
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &FeedKey) -> bool {
        self.slots.contains_key(key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits.saturating_add(self.misses);
        CacheStats {
            size: self.slots.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent: if total == 0 {
                0
            } else {
                (self.hits.saturating_mul(100) / total) as u8
            },
        }
    }

    fn evict(&mut self) {
        let to_evict = self.eviction_batch.min(self.slots.len());

        let mut by_access: BTreeMap<u64, FeedKey> = BTreeMap::new();
        for (key, slot) in &self.slots {
            by_access.insert(slot.last_access, key.clone());
        }

        for key in by_access.into_values().take(to_evict) {
            self.slots.remove(&key);
        }
    }
}

/// Hit/miss counters for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: u8,
}
