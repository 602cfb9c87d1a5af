//! Typed configuration contract and normalization rules.
//!
//! Input is an untyped attribute bag (JSON objects keyed by namespace).
//! Numeric fields accept integer or floating-point encodings; unknown
//! fields are ignored. Duration fields take Go-style strings such as
//! `"300ms"`, `"2s"`, or `"1m30s"`; anything unparsable falls back to the
//! documented default.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Namespace for endpoint-level rate limiting.
pub const ROUTER_NAMESPACE: &str = "qos/ratelimit/router";

/// Namespace for per-backend (proxy) rate limiting.
pub const PROXY_NAMESPACE: &str = "qos/ratelimit/proxy";

/// Default eviction threshold for idle per-client buckets.
pub const DATA_TTL: Duration = Duration::from_secs(10 * 60);

/// Default shard count for the per-client backend.
pub const DEFAULT_SHARDS: u64 = 2048;

/// Default wake period of the eviction engine.
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

const MIN_CLEANUP_PERIOD: Duration = Duration::from_secs(1);
const SECOND: Duration = Duration::from_secs(1);

/// The untyped attribute bag handed over by the host.
pub type ExtraConfig = Map<String, Value>;

/// Normalized endpoint-level configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RouterConfig {
    /// Global endpoint rate, requests per second. `<= 0` disables the
    /// global limiter.
    pub max_rate: f64,
    /// Global bucket capacity; `0` means "derive from `max_rate`".
    pub capacity: u64,
    /// Per-client rate, requests per second. `<= 0` disables the
    /// per-client limiter.
    pub client_max_rate: f64,
    /// Per-client bucket capacity; `0` means "derive from
    /// `client_max_rate`".
    pub client_capacity: u64,
    /// Key extraction strategy name: `ip`, `header`, or `param`. Anything
    /// else disables the per-client limiter.
    pub strategy: String,
    /// Header or parameter name for the extractor; empty means default IP
    /// extraction.
    pub key: String,
    /// Eviction threshold for idle per-client buckets.
    pub ttl: Duration,
    pub num_shards: u64,
    pub cleanup_period: Duration,
    pub cleanup_threads: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_rate: 0.0,
            capacity: 0,
            client_max_rate: 0.0,
            client_capacity: 0,
            strategy: String::new(),
            key: String::new(),
            ttl: DATA_TTL,
            num_shards: DEFAULT_SHARDS,
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
            cleanup_threads: 1,
        }
    }
}

impl RouterConfig {
    /// Read and normalize the `qos/ratelimit/router` section of an
    /// extra-config bag.
    pub fn from_extra_config(extra: &ExtraConfig) -> Result<Self, ConfigError> {
        let section = namespace_section(extra, ROUTER_NAMESPACE)?;
        let mut cfg = Self::default();

        if let Some(v) = section.get("max_rate").and_then(Value::as_f64) {
            cfg.max_rate = v;
        }
        if let Some(v) = section.get("capacity").and_then(as_u64) {
            cfg.capacity = v;
        }
        if let Some(v) = section.get("client_max_rate").and_then(Value::as_f64) {
            cfg.client_max_rate = v;
        }
        if let Some(v) = section.get("client_capacity").and_then(as_u64) {
            cfg.client_capacity = v;
        }
        if let Some(v) = section.get("strategy").and_then(Value::as_str) {
            cfg.strategy = v.to_string();
        }
        if let Some(v) = section.get("key").and_then(Value::as_str) {
            cfg.key = v.to_string();
        }

        if let Some(v) = section.get("every") {
            let every = duration_value(v)
                .filter(|every| *every >= SECOND)
                .unwrap_or(SECOND);
            let factor = SECOND.as_secs_f64() / every.as_secs_f64();
            cfg.max_rate *= factor;
            cfg.client_max_rate *= factor;

            if every > cfg.ttl {
                // A bucket must outlive a full rate window; jitter the
                // widened TTL so shards do not all expire in lockstep.
                cfg.ttl = every.mul_f64(1.0 + 0.25 * rand::rng().random::<f64>());
            }
        }

        if let Some(v) = section.get("num_shards").and_then(as_u64) {
            cfg.num_shards = v;
        }
        if let Some(v) = section.get("cleanup_period") {
            let period = duration_value(v).unwrap_or(DEFAULT_CLEANUP_PERIOD);
            cfg.cleanup_period = period.max(MIN_CLEANUP_PERIOD);
        }
        if let Some(v) = section.get("cleanup_threads").and_then(as_u64) {
            cfg.cleanup_threads = v;
        }

        Ok(cfg)
    }
}

/// Normalized per-backend (proxy) configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyConfig {
    /// Backend rate, requests per second. `<= 0` disables the limiter.
    pub max_rate: f64,
    /// Bucket capacity; `0` means "derive from `max_rate`".
    pub capacity: u64,
}

impl ProxyConfig {
    /// Read and normalize the `qos/ratelimit/proxy` section of an
    /// extra-config bag.
    pub fn from_extra_config(extra: &ExtraConfig) -> Result<Self, ConfigError> {
        let section = namespace_section(extra, PROXY_NAMESPACE)?;
        let mut cfg = Self::default();

        if let Some(v) = section.get("max_rate").and_then(Value::as_f64) {
            cfg.max_rate = v;
        }
        if let Some(v) = section.get("capacity").and_then(as_u64) {
            cfg.capacity = v;
        }

        if let Some(v) = section.get("every") {
            let every = duration_value(v).unwrap_or(SECOND);
            cfg.max_rate *= SECOND.as_secs_f64() / every.as_secs_f64();
        }

        Ok(cfg)
    }
}

fn namespace_section<'a>(
    extra: &'a ExtraConfig,
    namespace: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    let section = extra.get(namespace).ok_or(ConfigError::NoExtraConfig)?;
    section.as_object().ok_or(ConfigError::WrongExtraConfig)
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_f64().map(|f| f as u64))
}

fn duration_value(v: &Value) -> Option<Duration> {
    v.as_str().and_then(parse_duration)
}

/// Parse a Go-style duration string: one or more `<number><unit>` terms,
/// e.g. `"300ms"`, `"2s"`, `"1m30s"`, `"1.5h"`. Units: `ns`, `us`/`µs`,
/// `ms`, `s`, `m`, `h`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let mut rest = s.trim();
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let (scale, len) = if rest.starts_with("ns") {
            (1e-9, 2)
        } else if rest.starts_with("us") {
            (1e-6, 2)
        } else if rest.starts_with("µs") {
            (1e-6, "µs".len())
        } else if rest.starts_with("ms") {
            (1e-3, 2)
        } else if rest.starts_with('s') {
            (1.0, 1)
        } else if rest.starts_with('m') {
            (60.0, 1)
        } else if rest.starts_with('h') {
            (3600.0, 1)
        } else {
            return None;
        };
        rest = &rest[len..];

        let secs = value * scale;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        total += Duration::from_secs_f64(secs);
    }
    Some(total)
}
