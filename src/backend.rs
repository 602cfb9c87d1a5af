//! Key → limiter persistence: the backend trait and its sharded
//! in-memory implementation.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::config::{DATA_TTL, DEFAULT_CLEANUP_PERIOD, DEFAULT_SHARDS};
use crate::eviction::EvictionEngine;
use crate::hasher::{pseudo_fnv64a, KeyHasher};
use crate::limiter::SharedLimiter;
use crate::shard::MemoryShard;

/// The persistence seam of the limiter store.
pub trait Backend: Send + Sync {
    /// Look up `key`, constructing its limiter on first touch.
    fn load(&self, key: &str, build: &dyn Fn() -> SharedLimiter) -> SharedLimiter;

    /// Overwrite the limiter stored for `key`.
    fn store(&self, key: &str, value: SharedLimiter);
}

/// In-memory backend sharding the key space to avoid lock contention.
///
/// The shard array is fixed at construction; keys are dispatched by
/// `hash(key) mod N`. A single-shard instance is a valid degenerate case.
/// The backend owns its eviction engine: sweeping stops when the backend
/// is dropped (or explicitly via [`ShardedBackend::shutdown_eviction`]).
pub struct ShardedBackend {
    shards: Arc<Vec<MemoryShard>>,
    total: u64,
    hasher: KeyHasher,
    engine: EvictionEngine,
}

impl ShardedBackend {
    /// Backend with the default shard count, TTL, and hasher.
    ///
    /// Must be called within a tokio runtime (the eviction workers are
    /// spawned here).
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ShardedBackendBuilder {
        ShardedBackendBuilder::default()
    }

    fn shard(&self, key: &str) -> &MemoryShard {
        &self.shards[((self.hasher)(key) % self.total) as usize]
    }

    pub fn shard_count(&self) -> u64 {
        self.total
    }

    /// Number of keys resident across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(MemoryShard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(MemoryShard::is_empty)
    }

    /// Stop the background eviction workers. Entries stay resident until
    /// the backend itself is dropped.
    pub fn shutdown_eviction(&self) {
        self.engine.shutdown();
    }
}

impl Default for ShardedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ShardedBackend {
    fn load(&self, key: &str, build: &dyn Fn() -> SharedLimiter) -> SharedLimiter {
        self.shard(key).load(key, build)
    }

    fn store(&self, key: &str, value: SharedLimiter) {
        self.shard(key).store(key, value);
    }
}

impl std::fmt::Debug for ShardedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedBackend")
            .field("shards", &self.total)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ShardedBackend`].
pub struct ShardedBackendBuilder {
    num_shards: u64,
    ttl: Duration,
    cleanup_period: Duration,
    cleanup_threads: u64,
    hasher: KeyHasher,
    clock: Arc<dyn Clock>,
}

impl Default for ShardedBackendBuilder {
    fn default() -> Self {
        Self {
            num_shards: DEFAULT_SHARDS,
            ttl: DATA_TTL,
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
            cleanup_threads: 1,
            hasher: pseudo_fnv64a,
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl ShardedBackendBuilder {
    /// Shard count; values below 1 collapse to a single shard.
    pub fn num_shards(mut self, num_shards: u64) -> Self {
        self.num_shards = num_shards.max(1);
        self
    }

    /// Idleness threshold after which an entry is eligible for eviction.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// How often the eviction workers wake.
    pub fn cleanup_period(mut self, period: Duration) -> Self {
        self.cleanup_period = period;
        self
    }

    /// Number of parallel sweep workers; clamped to the shard count.
    pub fn cleanup_threads(mut self, threads: u64) -> Self {
        self.cleanup_threads = threads;
        self
    }

    pub fn hasher(mut self, hasher: KeyHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the backend and start its eviction workers.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> ShardedBackend {
        let total = self.num_shards.max(1);
        let shards: Arc<Vec<MemoryShard>> =
            Arc::new((0..total).map(|_| MemoryShard::new(self.clock.clone())).collect());
        let engine = EvictionEngine::start(
            shards.clone(),
            self.ttl,
            self.cleanup_period,
            self.cleanup_threads,
            self.clock,
        );
        ShardedBackend { shards, total, hasher: self.hasher, engine }
    }
}
