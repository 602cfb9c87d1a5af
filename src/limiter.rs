//! The opaque admission capability stored by backends.
//!
//! Backends store limiters as trait objects so that alternative admission
//! algorithms (leaky bucket, sliding window) can be slotted in without
//! touching the sharded map. The token bucket in [`crate::bucket`] is the
//! reference implementation.

use std::sync::Arc;

/// A rate limiter: one boolean admission decision per call.
pub trait Limiter: Send + Sync {
    /// Flags whether the current request can be processed. Updates the
    /// limiter's internal state when the request is admitted.
    fn allow(&self) -> bool;
}

/// Shared handle to a limiter, as stored in a backend.
pub type SharedLimiter = Arc<dyn Limiter>;

/// Factory invoked on first touch of a new key.
///
/// All construction parameters are expected to be captured once, so the
/// closure only allocates.
pub type LimiterBuilder = Arc<dyn Fn() -> SharedLimiter + Send + Sync>;
