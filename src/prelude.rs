//! Convenience re-exports for hosts wiring up rate limiting.

pub use crate::backend::{Backend, ShardedBackend, ShardedBackendBuilder};
pub use crate::bucket::TokenBucket;
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::config::{ExtraConfig, ProxyConfig, RouterConfig};
pub use crate::error::{ConfigError, Exceeded, GateError};
pub use crate::extractor::{ClientRequest, KeyExtractor, Strategy};
pub use crate::gate::{Decision, ProxyGate, RateLimitGate};
pub use crate::limiter::{Limiter, SharedLimiter};
pub use crate::middleware::{RateLimitLayer, RateLimitService};
pub use crate::store::LimiterStore;
pub use crate::telemetry::{LimitEvent, LimitObserver};
