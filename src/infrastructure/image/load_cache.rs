//! Bounded FIFO set of URLs that already loaded.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::{debug, trace};

use crate::domain::entities::ImageSize;
use crate::domain::options::DEFAULT_CACHE_CAPACITY;

/// Remembers which URLs loaded successfully, with their natural size.
///
/// Entries are never promoted: lookups use `peek`/`contains` and re-inserting
/// a known URL is a no-op, so the underlying LRU evicts in insertion order.
pub struct LoadCache {
    cache: LruCache<String, ImageSize>,
    hits: u64,
    misses: u64,
}

impl LoadCache {
    /// Creates a cache holding at most `capacity` URLs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            hits: 0,
            misses: 0,
        }
    }

    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }

    /// Membership test that also counts hits and misses.
    pub fn lookup(&mut self, url: &str) -> Option<ImageSize> {
        if let Some(size) = self.cache.peek(url) {
            self.hits += 1;
            trace!(url, "Load cache hit");
            Some(*size)
        } else {
            self.misses += 1;
            trace!(url, "Load cache miss");
            None
        }
    }

    /// Membership test without touching statistics.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.cache.contains(url)
    }

    /// Records a loaded URL. Returns the evicted URL when the cache was full.
    pub fn insert(&mut self, url: String, size: ImageSize) -> Option<String> {
        if self.cache.contains(&url) {
            return None;
        }

        let evicted = self.cache.push(url, size).map(|(old, _)| old);
        if let Some(old) = &evicted {
            debug!(url = %old, "Evicted oldest entry from load cache");
        }
        evicted
    }

    /// URLs from oldest to newest.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.cache.iter().rev().map(|(url, _)| url.clone()).collect()
    }

    /// Number of cached URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of URLs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.cache.clear();
        debug!("Cleared load cache");
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for LoadCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for LoadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached URLs.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} urls, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}
