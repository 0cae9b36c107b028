//! Byte-budgeted LRU of decoded marker icons

use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, warn};

use super::bitmap::IconBitmap;
use crate::observability::BridgeMetrics;

/// Running counters, reported alongside the cache size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IconCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rejected: u64,
}

struct CacheInner {
    entries: LruCache<String, IconBitmap>,
    size_bytes: usize,
    stats: IconCacheStats,
}

/// Keyed icon cache bounded by total decoded bytes
///
/// Recency is access order: [`get`](Self::get) promotes, [`contains`](Self::contains)
/// does not. Every bitmap leaving the cache through eviction, replacement,
/// removal or [`clear`](Self::clear) is recycled.
pub struct IconCache {
    capacity_bytes: usize,
    inner: Mutex<CacheInner>,
}

impl IconCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                size_bytes: 0,
                stats: IconCacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<IconBitmap> {
        let mut inner = self.lock();
        let found = inner.entries.get(key).cloned();
        if found.is_some() {
            inner.stats.hits += 1;
            BridgeMetrics::global().record_icon_cache_hit();
        } else {
            inner.stats.misses += 1;
            BridgeMetrics::global().record_icon_cache_miss();
        }
        found
    }

    /// Presence check without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains(key)
    }

    /// Insert `bitmap`, evicting least recently used entries until it fits
    pub fn put(&self, key: &str, bitmap: IconBitmap) {
        let size = bitmap.byte_count();
        let mut inner = self.lock();

        if let Some(previous) = inner.entries.pop(key) {
            inner.size_bytes -= previous.byte_count();
            if !previous.ptr_eq(&bitmap) {
                previous.recycle();
            }
        }

        if size > self.capacity_bytes {
            inner.stats.rejected += 1;
            warn!(
                "Icon '{}' ({} bytes) exceeds cache capacity of {} bytes; not cached",
                key, size, self.capacity_bytes
            );
            return;
        }

        while inner.size_bytes + size > self.capacity_bytes {
            let Some((evicted_key, evicted)) = inner.entries.pop_lru() else {
                break;
            };
            inner.size_bytes -= evicted.byte_count();
            inner.stats.evictions += 1;
            evicted.recycle();
            BridgeMetrics::global().record_icon_cache_eviction();
            debug!("Evicted icon '{}' ({} bytes)", evicted_key, evicted.byte_count());
        }

        inner.size_bytes += size;
        inner.entries.put(key.to_string(), bitmap);
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock();
        match inner.entries.pop(key) {
            Some(bitmap) => {
                inner.size_bytes -= bitmap.byte_count();
                bitmap.recycle();
                true
            }
            None => false,
        }
    }

    /// Drop and recycle every entry
    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        while let Some((_, bitmap)) = inner.entries.pop_lru() {
            bitmap.recycle();
        }
        inner.size_bytes = 0;
        if count > 0 {
            debug!("Cleared {} cached icons", count);
        }
    }

    /// Total resident bytes
    pub fn size(&self) -> usize {
        self.lock().size_bytes
    }

    pub fn capacity(&self) -> usize {
        self.capacity_bytes
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> IconCacheStats {
        self.lock().stats
    }
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("size_bytes", &self.size())
            .field("len", &self.len())
            .finish()
    }
}
