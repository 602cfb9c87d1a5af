//! Background TTL eviction over a shard array.
//!
//! The engine partitions the shards into contiguous slices, one per worker.
//! Workers run on independent timers and share no mutable state; a panic in
//! one sweep task cannot take down the others. All workers stop promptly
//! when the engine is shut down or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::shard::MemoryShard;

/// Handle to the background sweep workers of one backend.
///
/// Construction spawns tokio tasks and therefore must happen inside a
/// runtime. Dropping the handle stops the workers.
#[derive(Debug)]
pub struct EvictionEngine {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl EvictionEngine {
    /// Start `threads` sweep workers over `shards`, each waking every
    /// `period` and evicting entries idle for longer than `ttl`.
    ///
    /// The worker count is clamped to the shard count; a zero period is
    /// raised to one second so the timer stays well-defined.
    pub fn start(
        shards: Arc<Vec<MemoryShard>>,
        ttl: Duration,
        period: Duration,
        threads: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let period = if period.is_zero() { Duration::from_secs(1) } else { period };
        let ttl_nanos = u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX);
        let threads = threads.clamp(1, shards.len().max(1) as u64) as usize;
        let chunk = shards.len().div_ceil(threads).max(1);

        let (shutdown, rx) = watch::channel(false);
        let mut workers = Vec::with_capacity(threads);

        for worker in 0..threads {
            let start = worker * chunk;
            let end = ((worker + 1) * chunk).min(shards.len());
            if start >= end {
                break;
            }
            workers.push(tokio::spawn(sweep(
                shards.clone(),
                start..end,
                ttl_nanos,
                period,
                clock.clone(),
                rx.clone(),
            )));
        }

        Self { shutdown, workers }
    }

    /// Stop all sweep workers. Idempotent; also triggered on drop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for EvictionEngine {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn sweep(
    shards: Arc<Vec<MemoryShard>>,
    slice: std::ops::Range<usize>,
    ttl_nanos: u64,
    period: Duration,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately; consume it so the
    // first sweep happens one full period after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                let now = clock.now_nanos();
                let mut removed = 0;
                for shard in &shards[slice.clone()] {
                    removed += shard.prune(now, ttl_nanos);
                }
                if removed > 0 {
                    tracing::debug!(removed, shards = slice.len(), "evicted idle limiters");
                }
            }
        }
    }
}
