//! Token bucket admission primitive.
//!
//! Refill is lazy: tokens are only accrued once the bucket runs empty, and
//! `last_refill` advances by whole fill intervals rather than jumping to
//! "now", so sub-interval time is never lost and the long-run rate does not
//! drift under bursty consumption.

use std::sync::{Arc, Mutex};

use crate::clock::{Clock, MonotonicClock};
use crate::limiter::{Limiter, LimiterBuilder, SharedLimiter};

/// Smallest admissible rate, tokens per second. Rates below this are
/// coerced up so the fill interval stays finite.
const MIN_RATE: f64 = 1e-9;

/// Token bucket: each admitted request consumes one token; tokens refill at
/// a fixed rate up to a maximum capacity.
pub struct TokenBucket {
    /// Nanoseconds to accrue one token.
    fill_interval: u64,
    capacity: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

struct State {
    tokens: u64,
    /// Last instant at which at least one token was accrued, in clock
    /// nanoseconds. Advanced only by whole fill intervals.
    last_refill: u64,
}

fn fill_interval_nanos(rate: f64) -> u64 {
    // A rate above 1e9/s would truncate to a zero interval; one token per
    // nanosecond is the effective ceiling.
    ((1e9 / rate.max(MIN_RATE)) as u64).max(1)
}

fn clamp_params(capacity: u64, initial: u64) -> (u64, u64) {
    let capacity = capacity.max(1);
    (capacity, initial.min(capacity))
}

impl TokenBucket {
    /// Bucket with the given rate (tokens per second) and capacity, using
    /// the default monotonic clock and an initial stock of `capacity`.
    pub fn new(rate: f64, capacity: u64) -> Self {
        Self::with_clock(rate, capacity, Arc::new(MonotonicClock::new()))
    }

    /// Bucket with the given rate, capacity, and clock, starting full.
    pub fn with_clock(rate: f64, capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self::with_initial_stock(rate, capacity, capacity, clock)
    }

    /// Bucket with an explicit initial stock, coerced to at most `capacity`.
    pub fn with_initial_stock(rate: f64, capacity: u64, initial: u64, clock: Arc<dyn Clock>) -> Self {
        let (capacity, initial) = clamp_params(capacity, initial);
        let last_refill = clock.now_nanos();
        Self {
            fill_interval: fill_interval_nanos(rate),
            capacity,
            clock,
            state: Mutex::new(State { tokens: initial, last_refill }),
        }
    }

    /// Factory for buckets sharing one parameter set.
    ///
    /// The coercion checks run here, once; the returned closure only
    /// allocates. This is the builder handed to a backend for first-touch
    /// construction.
    pub fn builder(rate: f64, capacity: u64, initial: u64, clock: Arc<dyn Clock>) -> LimiterBuilder {
        let fill_interval = fill_interval_nanos(rate);
        let (capacity, initial) = clamp_params(capacity, initial);
        Arc::new(move || {
            let last_refill = clock.now_nanos();
            Arc::new(TokenBucket {
                fill_interval,
                capacity,
                clock: clock.clone(),
                state: Mutex::new(State { tokens: initial, last_refill }),
            }) as SharedLimiter
        })
    }

    /// Flags whether the current request can be processed, consuming one
    /// token if so.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap();

        if state.tokens > 0 {
            // delay the refill until the bucket is empty
            state.tokens -= 1;
            return true;
        }

        let accrued = self.clock.since_nanos(state.last_refill) / self.fill_interval;
        if accrued == 0 {
            return false;
        }

        // advance by whole intervals; the sub-interval remainder keeps
        // counting toward the next token
        state.last_refill += accrued * self.fill_interval;

        if state.tokens + accrued > self.capacity {
            // overflow: the admitted request consumes the excess implicitly
            state.tokens = self.capacity;
            return true;
        }

        state.tokens += accrued - 1;
        true
    }

    /// Maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl Limiter for TokenBucket {
    fn allow(&self) -> bool {
        TokenBucket::allow(self)
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("fill_interval", &self.fill_interval)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
