// Package manager composes the hash ring, shards, and AOF log into the
// public cache contract (Get/Set/Stats/Stop/LoadAOF) and owns the
// background janitor and AOF syncer tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aof::Aof;
use crate::error::AofError;
use crate::hashring::HashRing;
use crate::key::CacheKey;
use crate::storage::Shard;

/// Construction parameters for a [`CacheManager`]. Distinct from the
/// top-level [`crate::config::Settings`] so the manager stays usable
/// without pulling in CLI/YAML concerns.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub shard_count: usize,
    pub replicas: usize,
    pub shard_capacity: usize,
    pub aof_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
}

pub struct CacheManager<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    shards: Vec<Shard<K, V>>,
    ring: HashRing,
    aof: Option<Aof>,
    stop_token: CancellationToken,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl<K, V> CacheManager<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static,
{
    pub fn new(cfg: ManagerConfig) -> Result<Arc<Self>, AofError> {
        let mut shards = Vec::with_capacity(cfg.shard_count);
        for _ in 0..cfg.shard_count {
            shards.push(Shard::new(cfg.shard_capacity));
        }
        let ring = HashRing::new(cfg.shard_count, cfg.replicas);

        let aof = match cfg.aof_path {
            Some(path) if !path.as_os_str().is_empty() => Some(Aof::open(&path)?),
            _ => None,
        };

        Ok(Arc::new(Self {
            shards,
            ring,
            aof,
            stop_token: CancellationToken::new(),
            tasks: SyncMutex::new(Vec::new()),
        }))
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let shard = &self.shards[self.ring.route(key)];
        shard.get(key, now_unix_secs())
    }

    /// Sets `key` with the given time-to-live. Best-effort AOF append: a
    /// write failure is logged but never fails the in-memory Set.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = now_unix_secs();
        let ttl_secs = ttl.as_secs() as i64;
        let expires_at = if ttl_secs > 0 { now + ttl_secs } else { now };

        let shard = &self.shards[self.ring.route(&key)];
        shard.set(key.clone(), value.clone(), ttl_secs, now);

        if let Some(aof) = &self.aof {
            if let Err(err) = aof.append_set(&key, &value, expires_at) {
                error!(
                    component = "aof",
                    event = "append_failed",
                    error = %err,
                    "failed to append AOF record, continuing without durability for this write"
                );
            }
        }
    }

    pub fn stats(&self) -> Stats {
        let mut out = Stats::default();
        for shard in &self.shards {
            let s = shard.stats();
            out.hits += s.hits;
            out.misses += s.misses;
            out.evictions += s.evictions;
            out.len += s.len;
        }
        out
    }

    /// Replays the AOF, if one is configured, applying every non-expired
    /// record. Must be called before `start_janitor`/`start_aof_syncer` and
    /// before the manager accepts external traffic.
    pub async fn load_aof(self: &Arc<Self>) -> Result<usize, AofError> {
        let Some(aof) = &self.aof else {
            return Ok(0);
        };
        let path = aof.path().to_path_buf();
        let now = now_unix_secs();
        let mgr = Arc::clone(self);

        let applied = tokio::task::spawn_blocking(move || {
            crate::aof::replay::<K, V, _>(&path, now, |key, value, remaining_ttl| {
                let idx = mgr.ring.route(&key);
                mgr.shards[idx].set(key, value, remaining_ttl, now);
            })
        })
        .await
        .expect("AOF replay task panicked")?;

        info!(
            component = "manager",
            event = "aof_loaded",
            records_applied = applied,
            "AOF replay complete"
        );
        Ok(applied)
    }

    /// Spawns the periodic expired-entry reaper. A single tick never holds
    /// more than one shard's write lock at a time.
    pub fn start_janitor(self: &Arc<Self>, interval: Duration) {
        let mgr = Arc::clone(self);
        let token = self.stop_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = now_unix_secs();
                        let mut reclaimed = 0usize;
                        for shard in &mgr.shards {
                            if token.is_cancelled() {
                                break;
                            }
                            reclaimed += shard.delete_expired(now);
                        }
                        if reclaimed > 0 {
                            tracing::debug!(
                                component = "janitor",
                                event = "sweep_complete",
                                reclaimed,
                                "expired entries reclaimed"
                            );
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Spawns the periodic flush+fsync task.
    pub fn start_aof_syncer(self: &Arc<Self>, interval: Duration) {
        let Some(_) = &self.aof else {
            return;
        };
        let mgr = Arc::clone(self);
        let token = self.stop_token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Some(aof) = &mgr.aof {
                            if let Err(err) = aof.sync() {
                                error!(
                                    component = "aof",
                                    event = "sync_failed",
                                    error = %err,
                                    "AOF flush/fsync failed, will retry next tick"
                                );
                            }
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Cancels background tasks, waits for them to exit, and flushes the
    /// AOF. Idempotent: a second call finds no tasks left to join and a
    /// harmless no-op sync.
    pub async fn stop(&self) {
        self.stop_token.cancel();

        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(aof) = &self.aof {
            if let Err(err) = aof.sync() {
                error!(
                    component = "aof",
                    event = "final_sync_failed",
                    error = %err,
                    "failed to flush AOF during shutdown"
                );
            }
        }
    }

    pub fn shard_count(&self) -> usize {
        self.ring.shard_count()
    }
}

fn now_unix_secs() -> i64 {
    crate::time::unix_nano() / 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(aof_path: Option<PathBuf>) -> ManagerConfig {
        ManagerConfig {
            shard_count: 4,
            replicas: 3,
            shard_capacity: 2,
            aof_path,
        }
    }

    #[tokio::test]
    async fn basic_set_get_and_eviction() {
        let _time = crate::time::start(Duration::from_millis(1));
        let mgr: Arc<CacheManager<String, i32>> = CacheManager::new(cfg(None)).unwrap();

        mgr.set("a".into(), 1, Duration::from_secs(60));
        mgr.set("b".into(), 2, Duration::from_secs(60));
        assert_eq!(mgr.get(&"a".to_string()), Some(1));

        mgr.stop().await;
    }

    #[tokio::test]
    async fn janitor_reclaims_expired_entries() {
        let _time = crate::time::start(Duration::from_millis(1));
        let mgr: Arc<CacheManager<String, i32>> = CacheManager::new(cfg(None)).unwrap();
        mgr.set("x".into(), 1, Duration::from_millis(50));
        mgr.start_janitor(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = mgr.stats();
        assert_eq!(stats.len, 0);

        mgr.stop().await;
    }

    #[tokio::test]
    async fn aof_round_trip_across_managers() {
        let _time = crate::time::start(Duration::from_millis(1));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.aof");

        {
            let mgr: Arc<CacheManager<String, String>> =
                CacheManager::new(cfg(Some(path.clone()))).unwrap();
            mgr.set("user_1".into(), "Bruce".into(), Duration::from_secs(3600));
            mgr.stop().await;
        }

        let mgr2: Arc<CacheManager<String, String>> =
            CacheManager::new(cfg(Some(path.clone()))).unwrap();
        mgr2.load_aof().await.unwrap();
        assert_eq!(mgr2.get(&"user_1".to_string()), Some("Bruce".to_string()));
        mgr2.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let _time = crate::time::start(Duration::from_millis(1));
        let mgr: Arc<CacheManager<String, i32>> = CacheManager::new(cfg(None)).unwrap();
        mgr.start_janitor(Duration::from_millis(50));
        mgr.stop().await;
        mgr.stop().await;
    }

    #[tokio::test]
    async fn stats_are_additive_across_shards() {
        let _time = crate::time::start(Duration::from_millis(1));
        let mgr: Arc<CacheManager<String, i32>> = CacheManager::new(ManagerConfig {
            shard_count: 4,
            replicas: 3,
            shard_capacity: 64,
            aof_path: None,
        })
        .unwrap();
        for i in 0..50 {
            mgr.set(format!("k{i}"), i, Duration::from_secs(60));
        }
        for i in 0..50 {
            mgr.get(&format!("k{i}"));
        }
        mgr.get(&"missing".to_string());

        let stats = mgr.stats();
        assert_eq!(stats.hits, 50);
        assert_eq!(stats.misses, 1);
        mgr.stop().await;
    }
}
