#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Floodgate
//!
//! In-process, in-memory rate limiting for API gateways: a token-bucket
//! limiter behind a concurrent, sharded key store with background TTL
//! eviction.
//!
//! ## Features
//!
//! - **Token buckets** with lazy, drift-free refill and a pluggable clock
//! - **Sharded key → limiter store** with at-most-once first-touch
//!   construction under contention
//! - **Background TTL eviction** parallelizable across shard slices
//! - **Decision layer** composing a global endpoint bucket with per-client
//!   buckets keyed by IP, header, or parameter
//! - **Tower middleware** for dropping the decision layer into a service
//!   stack
//!
//! ## Quick Start
//!
//! ```rust
//! use std::net::IpAddr;
//! use floodgate::{ClientRequest, Decision, RateLimitGate, RouterConfig};
//!
//! struct Request {
//!     peer: IpAddr,
//! }
//!
//! impl ClientRequest for Request {
//!     fn header(&self, _name: &str) -> Option<&str> {
//!         None
//!     }
//!     fn param(&self, _name: &str) -> Option<&str> {
//!         None
//!     }
//!     fn peer_ip(&self) -> Option<IpAddr> {
//!         Some(self.peer)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = RouterConfig {
//!         client_max_rate: 100.0,
//!         strategy: "ip".to_string(),
//!         ..RouterConfig::default()
//!     };
//!     let gate = RateLimitGate::from_router_config(&cfg);
//!
//!     let request = Request { peer: "203.0.113.7".parse().unwrap() };
//!     match gate.decide(&request) {
//!         Decision::Admit => { /* forward to the endpoint */ }
//!         Decision::Reject(e) => {
//!             // 503 for a global breach, 429 for per-client breaches
//!             let _ = (e.status_code(), e.reason());
//!         }
//!     }
//! }
//! ```

pub mod backend;
pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod eviction;
pub mod extractor;
pub mod gate;
pub mod hasher;
pub mod limiter;
pub mod middleware;
pub mod prelude;
pub mod shard;
pub mod store;
pub mod telemetry;

// Re-exports
pub use backend::{Backend, ShardedBackend};
pub use bucket::TokenBucket;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ExtraConfig, ProxyConfig, RouterConfig, DATA_TTL, DEFAULT_SHARDS};
pub use error::{ConfigError, Exceeded, GateError, LIMIT_EXCEEDED};
pub use extractor::{
    ClientRequest, HeaderExtractor, IpExtractor, KeyExtractor, ParamExtractor, Strategy,
};
pub use gate::{Decision, ProxyGate, RateLimitGate};
pub use hasher::pseudo_fnv64a;
pub use limiter::{Limiter, LimiterBuilder, SharedLimiter};
pub use middleware::{RateLimitLayer, RateLimitService};
pub use store::LimiterStore;
pub use telemetry::{LimitEvent, LimitObserver, LogObserver, MemoryObserver, NullObserver};
