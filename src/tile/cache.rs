//! Server-side byte cache for served parts.
//!
//! Entries are keyed by [`CacheKey`] (canonical container plus part id), so
//! two request paths that resolve to the same part share one entry. The cache
//! tracks the total payload size and evicts least-recently-used entries once
//! either the byte budget or the entry cap is exceeded. Nothing expires on its
//! own: an entry lives until it is evicted or the process restarts.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use lru::LruCache;

use crate::zoomify::CacheKey;

/// Default byte budget: 100MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 100 * 1024 * 1024;

/// Default maximum number of entries
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Storage behind the pipeline's cache lookup and store steps.
pub trait TileStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Bytes>;

    /// Insert or replace. Concurrent puts of one key are last-write-wins.
    fn put(&self, key: CacheKey, data: Bytes);
}

struct Inner {
    entries: LruCache<CacheKey, Bytes>,
    current_size: usize,
}

/// LRU cache bounded by total bytes and entry count.
pub struct TileCache {
    inner: Mutex<Inner>,
    max_size: usize,
}

impl TileCache {
    /// Cache with the default budget (100MB, 10,000 entries).
    pub fn new() -> Self {
        Self::with_capacity_and_entries(DEFAULT_TILE_CACHE_CAPACITY, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// A zero entry cap is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                current_size: 0,
            }),
            max_size,
        }
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check presence without touching LRU order.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains(key)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Bytes> {
        let mut inner = self.lock();
        let data = inner.entries.pop(key)?;
        inner.current_size = inner.current_size.saturating_sub(data.len());
        Some(data)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.current_size = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Total bytes currently held.
    pub fn size(&self) -> usize {
        self.lock().current_size
    }

    /// Byte budget.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileStore for TileCache {
    fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.lock().entries.get(key).cloned()
    }

    fn put(&self, key: CacheKey, data: Bytes) {
        let data_size = data.len();
        let mut inner = self.lock();

        // `push` hands back whatever left the map: the old value for this key,
        // or the LRU entry pushed out by the entry cap.
        if let Some((_, displaced)) = inner.entries.push(key, data) {
            inner.current_size = inner.current_size.saturating_sub(displaced.len());
        }
        inner.current_size += data_size;

        while inner.current_size > self.max_size {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_size = inner.current_size.saturating_sub(evicted.len());
                }
                None => break,
            }
        }
    }
}
