// Package hashring implements consistent hashing with virtual nodes, routing
// arbitrary keys to a fixed shard count.

use crate::key::CacheKey;

/// Consistent-hash ring mapping keys to shard indices via virtual nodes.
///
/// Construction is `O(shard_count * replicas * log n)`; routing is
/// `O(log n)` via binary search over the sorted ring.
pub struct HashRing {
    ring: Vec<u32>,
    owners: Vec<usize>,
    shard_count: usize,
}

impl HashRing {
    /// Builds a ring with `replicas` virtual nodes per shard.
    ///
    /// Panics if `shard_count` or `replicas` is zero.
    pub fn new(shard_count: usize, replicas: usize) -> Self {
        assert!(shard_count > 0, "shard_count must be positive");
        assert!(replicas > 0, "replicas must be positive");

        let mut nodes: Vec<(u32, usize)> = Vec::with_capacity(shard_count * replicas);
        for shard in 0..shard_count {
            for replica in 0..replicas {
                let label = format!("shard-{}-v{}", shard, replica);
                nodes.push((fnv1a32(label.as_bytes()), shard));
            }
        }
        nodes.sort_unstable_by_key(|&(hash, _)| hash);
        nodes.dedup_by_key(|&mut (hash, _)| hash);

        let ring = nodes.iter().map(|&(hash, _)| hash).collect();
        let owners = nodes.iter().map(|&(_, shard)| shard).collect();

        Self {
            ring,
            owners,
            shard_count,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Resolves the shard index owning a raw 32-bit ring position.
    fn route_hash(&self, hash: u32) -> usize {
        let idx = self.ring.partition_point(|&h| h < hash);
        let idx = if idx == self.ring.len() { 0 } else { idx };
        self.owners[idx]
    }

    /// Resolves the shard index owning `key`.
    pub fn route<K: CacheKey>(&self, key: &K) -> usize {
        self.route_hash(fnv1a32(key.canonical_form().as_bytes()))
    }
}

/// FNV-1a, 32-bit variant.
fn fnv1a32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
