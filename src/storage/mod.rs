// Package storage implements the per-shard LRU+TTL index and the shard
// wrapper that makes it safe to share across threads.

pub mod lru;
pub mod shard;

pub use lru::LruIndex;
pub use shard::{Shard, ShardStats};
