//! Clock abstractions used by token buckets and the eviction engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Thread-safe time source abstraction.
///
/// Readings are nanoseconds since the implementer's own epoch; only
/// differences between readings are meaningful. Implementations must be
/// monotonic: a later call never returns a smaller value than an earlier
/// one. Overflow must not silently wrap; saturate instead.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in nanoseconds relative to the implementer's epoch.
    fn now_nanos(&self) -> u64;

    /// Nanoseconds elapsed since an earlier reading of this clock.
    fn since_nanos(&self, earlier: u64) -> u64 {
        self.now_nanos().saturating_sub(earlier)
    }
}

/// Monotonic clock backed by `Instant::now()`.
///
/// Clones share the same epoch (instant captured at creation).
/// Independently created instances have different epochs and their readings
/// are not directly comparable.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    /// Create a new monotonic clock starting at `Instant::now()`.
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    /// Returns nanoseconds elapsed since this instance's epoch.
    ///
    /// On the theoretical overflow (>584 years), saturates to `u64::MAX`.
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Virtual clock that advances only on explicit mutation.
///
/// Clones share the same underlying reading, so a clock handed to a bucket
/// or a backend can still be advanced from the test body.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a frozen clock at nanosecond zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `delta`. Saturates at `u64::MAX` nanoseconds.
    pub fn advance(&self, delta: Duration) {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        let _ = self.nanos.fetch_update(Ordering::AcqRel, Ordering::Acquire, |nanos| {
            Some(nanos.saturating_add(delta))
        });
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }
}
