//! Byte-bounded LRU memory cache for decoded thumbnails.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::decode::ImageResource;
use super::fetch::CacheKey;

/// Snapshot of memory cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
    pub max_bytes: u64,
}

struct CacheState<R> {
    entries: LruCache<CacheKey, Arc<R>>,
    // Every resource ever inserted, so an evicted one that is still in use
    // elsewhere can be restored without loading it again.
    weak: HashMap<CacheKey, Weak<R>>,
    size_bytes: u64,
}

impl<R: ImageResource> CacheState<R> {
    fn put(&mut self, key: CacheKey, resource: Arc<R>, max_bytes: u64) -> usize {
        let bytes = resource.size_bytes() as u64;
        self.weak.insert(key.clone(), Arc::downgrade(&resource));
        if let Some(previous) = self.entries.put(key, resource) {
            self.size_bytes -= previous.size_bytes() as u64;
        }
        self.size_bytes += bytes;

        let mut evicted = 0;
        while self.size_bytes > max_bytes {
            let Some((old_key, old)) = self.entries.pop_lru() else {
                break;
            };
            self.size_bytes -= old.size_bytes() as u64;
            evicted += 1;
            tracing::trace!("Evicted {} from memory cache", old_key);
        }
        if evicted > 0 {
            self.weak.retain(|_, resource| resource.strong_count() > 0);
        }
        evicted
    }
}

/// In-memory cache of decoded resources, evicting least recently used
/// entries once the byte budget is exceeded.
///
/// Evicted resources are released as soon as the last outstanding `Arc` is
/// dropped, which hands pooled pixel buffers back to their pool. Until then a
/// lookup finds the evicted resource and puts it back in the cache.
pub struct MemoryCache<R> {
    max_bytes: u64,
    state: Mutex<CacheState<R>>,
}

impl<R: ImageResource> MemoryCache<R> {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                weak: HashMap::new(),
                size_bytes: 0,
            }),
        }
    }

    /// Look up `key`, marking it as recently used.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<R>> {
        let mut state = self.state.lock();
        if let Some(hit) = state.entries.get(key) {
            return Some(Arc::clone(hit));
        }

        let revived = state.weak.get(key).and_then(Weak::upgrade)?;
        tracing::trace!("Restored {} from evicted resources still in use", key);
        state.put(key.clone(), Arc::clone(&revived), self.max_bytes);
        Some(revived)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Store `resource` under `key` and evict down to the byte budget.
    ///
    /// Resources larger than the whole budget are not cached. Returns the
    /// number of entries evicted.
    pub fn insert(&self, key: CacheKey, resource: Arc<R>) -> usize {
        let bytes = resource.size_bytes() as u64;
        if bytes > self.max_bytes {
            tracing::debug!(
                "Not caching {}: {} bytes exceeds cache budget of {}",
                key,
                bytes,
                self.max_bytes
            );
            return 0;
        }

        self.state.lock().put(key, resource, self.max_bytes)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Arc<R>> {
        let mut state = self.state.lock();
        state.weak.remove(key);
        let removed = state.entries.pop(key)?;
        state.size_bytes -= removed.size_bytes() as u64;
        Some(removed)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.weak.clear();
        state.size_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            size_bytes: state.size_bytes,
            max_bytes: self.max_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pool::{BitmapPool, LruBitmapPool, PooledImage};
    use image::DynamicImage;

    // 16x16 RGBA = 1 KiB per entry.
    const ENTRY: u64 = 1024;

    fn pooled(pool: &Arc<LruBitmapPool>) -> Arc<PooledImage> {
        Arc::new(PooledImage::new(
            DynamicImage::new_rgba8(16, 16),
            pool.clone(),
        ))
    }

    fn key(id: u32) -> CacheKey {
        CacheKey::new(&format!("content://media/{id}"), 16, 16)
    }

    #[test]
    fn test_get_after_insert() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY * 4);
        let resource = pooled(&pool);

        cache.insert(key(1), resource.clone());
        let hit = cache.get(&key(1)).unwrap();
        assert!(Arc::ptr_eq(&hit, &resource));
        assert!(cache.get(&key(2)).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY * 2);

        cache.insert(key(1), pooled(&pool));
        cache.insert(key(2), pooled(&pool));
        cache.get(&key(1));
        let evicted = cache.insert(key(3), pooled(&pool));

        assert_eq!(evicted, 1);
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert_eq!(cache.stats().size_bytes, ENTRY * 2);
    }

    #[test]
    fn test_eviction_recycles_into_pool() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY);

        cache.insert(key(1), pooled(&pool));
        assert!(pool.is_empty());
        cache.insert(key(2), pooled(&pool));

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.size_bytes(), ENTRY);
    }

    #[test]
    fn test_evicted_resource_in_use_is_restored() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY);

        let held = pooled(&pool);
        cache.insert(key(1), held.clone());
        cache.insert(key(2), pooled(&pool));
        assert!(!cache.contains(&key(1)));

        let restored = cache.get(&key(1)).unwrap();
        assert!(Arc::ptr_eq(&restored, &held));
        assert!(cache.contains(&key(1)));
        // Restoring evicted the other entry to stay in budget.
        assert!(!cache.contains(&key(2)));
        assert_eq!(cache.stats().size_bytes, ENTRY);
    }

    #[test]
    fn test_released_resource_is_not_restored() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY);

        cache.insert(key(1), pooled(&pool));
        cache.insert(key(2), pooled(&pool));

        assert!(cache.get(&key(1)).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_oversized_resource_is_not_cached() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY / 2);
        cache.insert(key(1), pooled(&pool));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_replace_keeps_accounting() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY * 4);
        cache.insert(key(1), pooled(&pool));
        cache.insert(key(1), pooled(&pool));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.size_bytes, ENTRY);
    }

    #[test]
    fn test_remove_and_clear() {
        let pool = Arc::new(LruBitmapPool::new(ENTRY * 8));
        let cache = MemoryCache::new(ENTRY * 4);
        cache.insert(key(1), pooled(&pool));
        cache.insert(key(2), pooled(&pool));

        assert!(cache.remove(&key(1)).is_some());
        assert_eq!(cache.stats().size_bytes, ENTRY);

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().size_bytes, 0);
        assert_eq!(pool.len(), 2);
    }
}
