//! Tower middleware enforcing the decision layer.
//!
//! The layer wraps any service whose request type exposes the
//! [`ClientRequest`](crate::extractor::ClientRequest) view. Rejected
//! requests never reach the inner service; they surface as
//! [`GateError::Limited`] carrying the 503/429 status for the host to map.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower_layer::Layer;
use tower_service::Service;

use crate::error::GateError;
use crate::extractor::ClientRequest;
use crate::gate::{Decision, RateLimitGate};

/// A layer that enforces rate limits using a [`RateLimitGate`].
pub struct RateLimitLayer<R> {
    gate: Arc<RateLimitGate<R>>,
}

impl<R> RateLimitLayer<R> {
    /// Create a new rate limit layer.
    pub fn new(gate: RateLimitGate<R>) -> Self {
        Self { gate: Arc::new(gate) }
    }
}

impl<R> Clone for RateLimitLayer<R> {
    fn clone(&self) -> Self {
        Self { gate: self.gate.clone() }
    }
}

impl<S, R> Layer<S> for RateLimitLayer<R> {
    type Service = RateLimitService<S, R>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService { inner: service, gate: self.gate.clone() }
    }
}

/// Middleware service that enforces rate limits.
pub struct RateLimitService<S, R> {
    inner: S,
    gate: Arc<RateLimitGate<R>>,
}

impl<S: Clone, R> Clone for RateLimitService<S, R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), gate: self.gate.clone() }
    }
}

impl<S, R> Service<R> for RateLimitService<S, R>
where
    S: Service<R> + Clone + Send + 'static,
    S::Future: Send + 'static,
    R: ClientRequest + Send + 'static,
{
    type Response = S::Response;
    type Error = GateError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: R) -> Self::Future {
        // The decision is lock-only and instantaneous; take it before
        // touching the inner service so rejected requests cost nothing.
        match self.gate.decide(&req) {
            Decision::Admit => {
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await.map_err(GateError::Inner) })
            }
            Decision::Reject(exceeded) => {
                Box::pin(async move { Err::<S::Response, _>(GateError::Limited(exceeded)) })
            }
        }
    }
}
