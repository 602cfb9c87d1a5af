//! The limiter store: key → limiter, building on first touch.

use std::sync::Arc;

use crate::backend::{Backend, ShardedBackend};
use crate::bucket::TokenBucket;
use crate::clock::{Clock, MonotonicClock};
use crate::config::RouterConfig;
use crate::limiter::{LimiterBuilder, SharedLimiter};

/// Maps a decision key to its limiter, creating one on first touch.
///
/// All bucket parameters are captured once at construction; lookups are
/// safe for concurrent use because the backend's `load` is.
#[derive(Clone)]
pub struct LimiterStore {
    backend: Arc<dyn Backend>,
    build: LimiterBuilder,
}

impl LimiterStore {
    /// Store of token buckets with the given per-key rate and capacity,
    /// starting full, over `backend`.
    pub fn new(rate: f64, capacity: u64, backend: Arc<dyn Backend>) -> Self {
        Self::with_clock(rate, capacity, backend, Arc::new(MonotonicClock::new()))
    }

    /// Same as [`LimiterStore::new`] with an explicit clock.
    pub fn with_clock(
        rate: f64,
        capacity: u64,
        backend: Arc<dyn Backend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_builder(backend, TokenBucket::builder(rate, capacity, capacity, clock))
    }

    /// Store over an arbitrary limiter factory.
    pub fn with_builder(backend: Arc<dyn Backend>, build: LimiterBuilder) -> Self {
        Self { backend, build }
    }

    /// Store built straight from a normalized config: a sharded in-memory
    /// backend (collapsing to a single shard when `num_shards <= 1`) under
    /// token buckets at the client rate.
    ///
    /// Must be called within a tokio runtime (the backend starts its
    /// eviction workers).
    pub fn from_config(cfg: &RouterConfig, capacity: u64, clock: Arc<dyn Clock>) -> Self {
        let backend = ShardedBackend::builder()
            .num_shards(cfg.num_shards)
            .ttl(cfg.ttl)
            .cleanup_period(cfg.cleanup_period)
            .cleanup_threads(cfg.cleanup_threads)
            .clock(clock.clone())
            .build();
        Self::with_clock(cfg.client_max_rate, capacity, Arc::new(backend), clock)
    }

    /// The limiter for `key`, created on first touch.
    pub fn limiter(&self, key: &str) -> SharedLimiter {
        self.backend.load(key, &|| (self.build)())
    }
}

impl std::fmt::Debug for LimiterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimiterStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sharded() -> Arc<dyn Backend> {
        Arc::new(ShardedBackend::builder().num_shards(16).build())
    }

    #[tokio::test]
    async fn distinct_keys_rate_limit_independently() {
        let clock = ManualClock::new();
        let store = LimiterStore::with_clock(1.0, 1, sharded(), Arc::new(clock));

        assert!(store.limiter("1").allow());
        assert!(!store.limiter("1").allow());
        assert!(store.limiter("2").allow());
    }

    #[tokio::test]
    async fn same_key_returns_the_same_bucket() {
        let store = LimiterStore::new(1.0, 1, sharded());
        let a = store.limiter("k");
        let b = store.limiter("k");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn refill_applies_per_key() {
        let clock = ManualClock::new();
        let store = LimiterStore::with_clock(1.0, 1, sharded(), Arc::new(clock.clone()));

        assert!(store.limiter("k").allow());
        assert!(!store.limiter("k").allow());

        clock.advance(Duration::from_secs(1));
        assert!(store.limiter("k").allow());
    }

    #[tokio::test]
    async fn custom_builder_is_invoked_once_per_key() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let build: LimiterBuilder = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(TokenBucket::new(1.0, 1))
        });
        let store = LimiterStore::with_builder(sharded(), build);

        store.limiter("a");
        store.limiter("a");
        store.limiter("b");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn from_config_collapses_to_single_shard() {
        let cfg = RouterConfig { client_max_rate: 1.0, num_shards: 0, ..RouterConfig::default() };
        let store = LimiterStore::from_config(&cfg, 1, Arc::new(ManualClock::new()));

        assert!(store.limiter("x").allow());
        assert!(!store.limiter("x").allow());
        assert!(store.limiter("y").allow());
    }
}
