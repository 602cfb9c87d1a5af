//! On-limit observation hook.
//!
//! The decision layer reports every rejection through a [`LimitObserver`].
//! The default observer does nothing; hosts plug in their own to feed
//! logs or metrics without the core growing an observability surface.

use std::sync::Mutex;

use serde::Serialize;

/// One rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LimitEvent {
    /// The endpoint-wide bucket rejected the request.
    GlobalExceeded,
    /// The bucket for one client key rejected the request.
    ClientExceeded {
        /// The extracted decision key.
        key: String,
    },
    /// No decision key could be extracted from the request.
    KeyMissing,
}

/// Observer invoked on every rejection. Implementations must be cheap:
/// the hook runs on the request path.
pub trait LimitObserver: Send + Sync {
    fn on_limit(&self, event: &LimitEvent);
}

/// Observer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl LimitObserver for NullObserver {
    fn on_limit(&self, _event: &LimitEvent) {}
}

/// Observer that logs rejections through `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl LimitObserver for LogObserver {
    fn on_limit(&self, event: &LimitEvent) {
        match event {
            LimitEvent::GlobalExceeded => tracing::debug!("rate limit exceeded (global)"),
            LimitEvent::ClientExceeded { key } => {
                tracing::debug!(%key, "rate limit exceeded (client)");
            }
            LimitEvent::KeyMissing => tracing::debug!("rate limit key missing"),
        }
    }
}

/// Observer that records events in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<LimitEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<LimitEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl LimitObserver for MemoryObserver {
    fn on_limit(&self, event: &LimitEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
