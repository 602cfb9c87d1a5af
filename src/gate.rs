//! The decision layer: composing a global bucket and a per-client store
//! into a single allow/deny per request.

use std::sync::Arc;

use crate::bucket::TokenBucket;
use crate::clock::{Clock, MonotonicClock};
use crate::config::{ExtraConfig, ProxyConfig, RouterConfig};
use crate::error::Exceeded;
use crate::extractor::{ClientRequest, KeyExtractor, Strategy};
use crate::store::LimiterStore;
use crate::telemetry::{LimitEvent, LimitObserver, NullObserver};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject(Exceeded),
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Derive a bucket capacity from its rate when none was configured.
fn derive_capacity(rate: f64, configured: u64) -> u64 {
    if configured != 0 {
        return configured;
    }
    if rate < 1.0 {
        1
    } else {
        rate as u64
    }
}

/// Endpoint-level decision layer.
///
/// Built from a normalized [`RouterConfig`]; each disabled piece is simply
/// absent, so a gate with neither a global nor a per-client limiter admits
/// every request. Construction must happen inside a tokio runtime when a
/// per-client store is enabled (its backend starts eviction workers).
pub struct RateLimitGate<R> {
    global: Option<TokenBucket>,
    client: Option<ClientGate<R>>,
    observer: Arc<dyn LimitObserver>,
}

struct ClientGate<R> {
    store: LimiterStore,
    extractor: Box<dyn KeyExtractor<R>>,
}

impl<R: ClientRequest> RateLimitGate<R> {
    /// Gate that admits everything.
    pub fn disabled() -> Self {
        Self { global: None, client: None, observer: Arc::new(NullObserver) }
    }

    /// Build from a normalized config with the default monotonic clock.
    pub fn from_router_config(cfg: &RouterConfig) -> Self {
        Self::with_clock(cfg, Arc::new(MonotonicClock::new()))
    }

    /// Build from a normalized config with an explicit clock.
    pub fn with_clock(cfg: &RouterConfig, clock: Arc<dyn Clock>) -> Self {
        let mut gate = Self::disabled();

        if cfg.max_rate > 0.0 {
            let capacity = derive_capacity(cfg.max_rate, cfg.capacity);
            tracing::debug!(
                max_rate = cfg.max_rate,
                capacity,
                "endpoint rate limit enabled"
            );
            gate.global = Some(TokenBucket::with_clock(cfg.max_rate, capacity, clock.clone()));
        }

        if cfg.client_max_rate > 0.0 {
            match Strategy::from_name(&cfg.strategy) {
                Some(strategy) => {
                    let capacity = derive_capacity(cfg.client_max_rate, cfg.client_capacity);
                    tracing::debug!(
                        strategy = ?strategy,
                        client_max_rate = cfg.client_max_rate,
                        capacity,
                        "client rate limit enabled"
                    );
                    gate.client = Some(ClientGate {
                        store: LimiterStore::from_config(cfg, capacity, clock),
                        extractor: strategy.extractor(&cfg.key),
                    });
                }
                None => {
                    tracing::warn!("Unknown strategy {}", cfg.strategy);
                }
            }
        }

        gate
    }

    /// Build straight from an extra-config bag, applying the fail-open
    /// policy: an absent namespace is quietly disabled, a malformed one is
    /// logged and disabled.
    pub fn from_extra_config(extra: &ExtraConfig) -> Self {
        match RouterConfig::from_extra_config(extra) {
            Ok(cfg) => Self::from_router_config(&cfg),
            Err(err) => {
                if err.is_malformed() {
                    tracing::error!(%err, "rate limit config rejected; limiting disabled");
                }
                Self::disabled()
            }
        }
    }

    /// Replace the on-limit observer.
    pub fn with_observer(mut self, observer: Arc<dyn LimitObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// True when neither limiter is configured.
    pub fn is_disabled(&self) -> bool {
        self.global.is_none() && self.client.is_none()
    }

    /// Decide whether to admit `req`.
    ///
    /// The global bucket is consulted first (503 on breach), then the
    /// per-client store (429 on a missing key or breach).
    pub fn decide(&self, req: &R) -> Decision {
        if let Some(global) = &self.global {
            if !global.allow() {
                self.observer.on_limit(&LimitEvent::GlobalExceeded);
                return Decision::Reject(Exceeded::Global);
            }
        }

        if let Some(client) = &self.client {
            let Some(key) = client.extractor.extract(req) else {
                self.observer.on_limit(&LimitEvent::KeyMissing);
                return Decision::Reject(Exceeded::MissingKey);
            };
            if !client.store.limiter(&key).allow() {
                self.observer.on_limit(&LimitEvent::ClientExceeded { key });
                return Decision::Reject(Exceeded::Client);
            }
        }

        Decision::Admit
    }
}

impl<R> std::fmt::Debug for RateLimitGate<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitGate")
            .field("global", &self.global.is_some())
            .field("client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-backend (proxy) decision layer: a single shared bucket, no keying.
pub struct ProxyGate {
    bucket: Option<TokenBucket>,
    observer: Arc<dyn LimitObserver>,
}

impl ProxyGate {
    pub fn disabled() -> Self {
        Self { bucket: None, observer: Arc::new(NullObserver) }
    }

    pub fn from_proxy_config(cfg: &ProxyConfig) -> Self {
        Self::with_clock(cfg, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(cfg: &ProxyConfig, clock: Arc<dyn Clock>) -> Self {
        if cfg.max_rate <= 0.0 {
            return Self::disabled();
        }
        let capacity = derive_capacity(cfg.max_rate, cfg.capacity);
        tracing::debug!(max_rate = cfg.max_rate, capacity, "backend rate limit enabled");
        Self {
            bucket: Some(TokenBucket::with_clock(cfg.max_rate, capacity, clock)),
            observer: Arc::new(NullObserver),
        }
    }

    /// Build straight from an extra-config bag; same fail-open policy as
    /// [`RateLimitGate::from_extra_config`].
    pub fn from_extra_config(extra: &ExtraConfig) -> Self {
        match ProxyConfig::from_extra_config(extra) {
            Ok(cfg) => Self::from_proxy_config(&cfg),
            Err(err) => {
                if err.is_malformed() {
                    tracing::error!(%err, "backend rate limit config rejected; limiting disabled");
                }
                Self::disabled()
            }
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LimitObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.bucket.is_none()
    }

    /// Decide whether to forward one request to the backend.
    pub fn check(&self) -> Decision {
        match &self.bucket {
            Some(bucket) if !bucket.allow() => {
                self.observer.on_limit(&LimitEvent::GlobalExceeded);
                Decision::Reject(Exceeded::Global)
            }
            _ => Decision::Admit,
        }
    }
}

impl std::fmt::Debug for ProxyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyGate").field("enabled", &self.bucket.is_some()).finish()
    }
}
