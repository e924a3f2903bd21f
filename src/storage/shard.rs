// A shard is an LRU index plus the reader-writer lock that makes it the
// unit of concurrency for the cache manager.

use parking_lot::RwLock;

use crate::key::CacheKey;
use crate::storage::lru::LruIndex;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShardStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
}

pub struct Shard<K: CacheKey, V: Clone> {
    index: RwLock<LruIndex<K, V>>,
}

impl<K: CacheKey, V: Clone> Shard<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            index: RwLock::new(LruIndex::new(capacity)),
        }
    }

    /// Get mutates recency, so it always takes the lock exclusively.
    pub fn get(&self, key: &K, now: i64) -> Option<V> {
        self.index.write().get(key, now)
    }

    pub fn set(&self, key: K, value: V, ttl_secs: i64, now: i64) {
        self.index.write().set(key, value, ttl_secs, now);
    }

    pub fn delete_expired(&self, now: i64) -> usize {
        self.index.write().delete_expired(now)
    }

    pub fn stats(&self) -> ShardStats {
        let guard = self.index.read();
        let (hits, misses, evictions) = guard.stats();
        ShardStats {
            hits,
            misses,
            evictions,
            len: guard.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn items(&self) -> Vec<(K, V, i64)> {
        self.index.read().items()
    }
}
