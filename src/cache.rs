use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::NewsItem;

/// Category name reserved for the trending list
pub const TRENDING_CATEGORY: &str = "trending";

/// Source of "now" for TTL checks, injectable for tests
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cache key: one page of one category
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PageKey {
    pub category: String,
    pub page: u32,
}

impl PageKey {
    pub fn new(category: &str, page: u32) -> Self {
        Self {
            category: category.to_string(),
            page,
        }
    }

    /// Reserved key for the unpaginated trending list
    pub fn trending() -> Self {
        Self::new(TRENDING_CATEGORY, 1)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Vec<NewsItem>,
    pub timestamp: DateTime<Utc>,
    /// Byte length of the JSON-serialized data
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory store of prior responses, bounded by entry count and expired
/// by TTL. Owned by the feed controller; single-threaded, so no locking.
pub struct ResponseCache {
    entries: HashMap<PageKey, CacheEntry>,
    ttl_secs: u64,
    max_entries: usize,
    clock: Box<dyn Clock + Send + Sync>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self::with_clock(ttl_secs, max_entries, Box::new(SystemClock))
    }

    pub fn with_clock(
        ttl_secs: u64,
        max_entries: usize,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_secs,
            max_entries,
            clock,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up an entry, honoring the TTL. Expired entries stay in the
    /// store so they remain available to `get_stale`.
    pub fn get(&mut self, key: &PageKey) -> Option<&CacheEntry> {
        let now = self.clock.now();
        let fresh = self
            .entries
            .get(key)
            .map(|entry| {
                now.signed_duration_since(entry.timestamp).num_seconds() <= self.ttl_secs as i64
            })
            .unwrap_or(false);

        if fresh {
            self.hits += 1;
            debug!(category = %key.category, page = key.page, "Cache hit");
            self.entries.get(key)
        } else {
            self.misses += 1;
            debug!(category = %key.category, page = key.page, "Cache miss");
            None
        }
    }

    /// Look up an entry regardless of its age. Used as the degraded
    /// response when a live fetch fails.
    pub fn get_stale(&self, key: &PageKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Store a response under the key, replacing any previous entry. When
    /// the store is at capacity, the single oldest entry is evicted first.
    pub fn put(&mut self, key: PageKey, data: Vec<NewsItem>) {
        let size = serde_json::to_vec(&data)
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }

        debug!(category = %key.category, page = key.page, size, "Cached response");
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now(),
            size,
        };
        self.entries.insert(key, entry);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.timestamp)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!(category = %key.category, page = key.page, "Evicted oldest cache entry");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_bytes: self.entries.values().map(|entry| entry.size).sum(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}
