//! A single shard: key → limiter map with per-key last-access tracking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::clock::Clock;
use crate::limiter::SharedLimiter;

/// One partition of the key space.
///
/// Holds the limiter map and a mirror of last-access instants under a
/// single readers-writer lock. Lookups of existing keys take the read lock;
/// the write lock is taken only on first touch of a new key, to bump a
/// last-access entry, or by the eviction sweep.
pub struct MemoryShard {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, SharedLimiter>,
    last_access: HashMap<String, u64>,
}

impl MemoryShard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { inner: RwLock::new(Inner::default()), clock }
    }

    /// Look up `key`, constructing its limiter on first touch.
    ///
    /// Concurrent first-touch of the same key is resolved by a re-check
    /// under the write lock: exactly one caller's `build` result is stored
    /// and every caller observes that same instance.
    pub fn load(&self, key: &str, build: &dyn Fn() -> SharedLimiter) -> SharedLimiter {
        let hit = { self.inner.read().unwrap().data.get(key).cloned() };
        let now = self.clock.now_nanos();

        if let Some(v) = hit {
            let mut inner = self.inner.write().unwrap();
            // The entry may have been pruned between the two locks; do not
            // resurrect a last-access record for a key with no data.
            if inner.data.contains_key(key) {
                match inner.last_access.get(key) {
                    Some(&t0) if t0 >= now => {}
                    _ => {
                        inner.last_access.insert(key.to_string(), now);
                    }
                }
            }
            return v;
        }

        let mut inner = self.inner.write().unwrap();
        if let Some(v) = inner.data.get(key) {
            return v.clone();
        }

        let v = build();
        inner.last_access.insert(key.to_string(), now);
        inner.data.insert(key.to_string(), v.clone());
        v
    }

    /// Overwrite the limiter stored for `key`.
    pub fn store(&self, key: &str, value: SharedLimiter) {
        let now = self.clock.now_nanos();
        let mut inner = self.inner.write().unwrap();
        inner.last_access.insert(key.to_string(), now);
        inner.data.insert(key.to_string(), value);
    }

    /// Remove every entry whose last access is older than `ttl_nanos`.
    ///
    /// The whole delete batch runs under the write lock so a concurrent
    /// load cannot resurrect an entry between decision and deletion.
    /// Returns the number of evicted entries.
    pub fn prune(&self, now_nanos: u64, ttl_nanos: u64) -> usize {
        let mut inner = self.inner.write().unwrap();
        let expired: Vec<String> = inner
            .last_access
            .iter()
            .filter(|(_, &t)| t.saturating_add(ttl_nanos) < now_nanos)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.data.remove(key);
            inner.last_access.remove(key);
        }
        expired.len()
    }

    /// Number of keys currently resident.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().unwrap().data.contains_key(key)
    }
}

impl std::fmt::Debug for MemoryShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryShard").field("len", &self.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::TokenBucket;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shard_with_clock() -> (MemoryShard, ManualClock) {
        let clock = ManualClock::new();
        let shard = MemoryShard::new(Arc::new(clock.clone()));
        (shard, clock)
    }

    fn bucket() -> SharedLimiter {
        Arc::new(TokenBucket::new(1.0, 1))
    }

    fn paired(shard: &MemoryShard) -> (usize, usize) {
        let inner = shard.inner.read().unwrap();
        (inner.data.len(), inner.last_access.len())
    }

    #[test]
    fn load_builds_once_and_reuses() {
        let (shard, _clock) = shard_with_clock();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            bucket()
        };

        let first = shard.load("k", &build);
        let second = shard.load("k", &build);

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn prune_removes_only_idle_entries() {
        let (shard, clock) = shard_with_clock();
        shard.load("old", &bucket);

        clock.advance(Duration::from_secs(5));
        shard.load("fresh", &bucket);

        let ttl = Duration::from_secs(3).as_nanos() as u64;
        let removed = shard.prune(clock.now_nanos(), ttl);

        assert_eq!(removed, 1);
        assert!(!shard.contains("old"));
        assert!(shard.contains("fresh"));
    }

    #[test]
    fn load_bumps_last_access_and_defers_eviction() {
        let (shard, clock) = shard_with_clock();
        shard.load("k", &bucket);

        clock.advance(Duration::from_secs(2));
        shard.load("k", &bucket); // refreshes last access

        clock.advance(Duration::from_secs(2));
        let ttl = Duration::from_secs(3).as_nanos() as u64;
        assert_eq!(shard.prune(clock.now_nanos(), ttl), 0);
        assert!(shard.contains("k"));
    }

    #[test]
    fn entry_exactly_at_ttl_survives() {
        let (shard, clock) = shard_with_clock();
        shard.load("k", &bucket);

        clock.advance(Duration::from_secs(3));
        let ttl = Duration::from_secs(3).as_nanos() as u64;
        // t + ttl == now is not strictly older than the threshold.
        assert_eq!(shard.prune(clock.now_nanos(), ttl), 0);
    }

    #[test]
    fn maps_stay_paired_through_load_store_prune() {
        let (shard, clock) = shard_with_clock();
        for i in 0..50 {
            shard.load(&format!("k{i}"), &bucket);
        }
        shard.store("k0", bucket());
        shard.store("new", bucket());

        let (data, access) = paired(&shard);
        assert_eq!(data, 51);
        assert_eq!(access, 51);

        clock.advance(Duration::from_secs(10));
        shard.load("survivor", &bucket);
        shard.prune(clock.now_nanos(), Duration::from_secs(5).as_nanos() as u64);

        let (data, access) = paired(&shard);
        assert_eq!(data, 1);
        assert_eq!(access, 1);
        assert!(shard.contains("survivor"));
    }

    #[test]
    fn store_overwrites_existing_limiter() {
        let (shard, _clock) = shard_with_clock();
        let first = shard.load("k", &bucket);

        let replacement = bucket();
        shard.store("k", replacement.clone());

        let loaded = shard.load("k", &bucket);
        assert!(!Arc::ptr_eq(&first, &loaded));
        assert!(Arc::ptr_eq(&replacement, &loaded));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn last_access_bump_is_monotonic() {
        let (shard, clock) = shard_with_clock();
        clock.advance(Duration::from_secs(1));
        shard.load("k", &bucket);

        {
            // Simulate a stale bump racing a fresher one.
            let mut inner = shard.inner.write().unwrap();
            inner.last_access.insert("k".to_string(), 5_000_000_000);
        }
        shard.load("k", &bucket); // now = 1s, older than the recorded 5s

        let inner = shard.inner.read().unwrap();
        assert_eq!(inner.last_access["k"], 5_000_000_000);
    }
}
