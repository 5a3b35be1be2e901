//! # Event handlers.
//!
//! [`Handler`] is the extension point for reacting to bus events. A handler
//! receives a shared `Arc<Event>` (it can never mutate it) and reports failure
//! by returning [`HandlerError`]. Failures, panics and timeouts are isolated by
//! the bus: they show up in metrics and logs, never in the publisher.
//!
//! [`HandlerFn`] adapts a closure `Fn(Arc<Event>) -> Fut`, producing a fresh
//! future per invocation.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modvisor::{Event, HandlerError, HandlerFn, HandlerRef};
//!
//! let h: HandlerRef = HandlerFn::arc("printer", |ev: Arc<Event>| async move {
//!     println!("{} from {}", ev.event_type(), ev.source());
//!     Ok::<_, HandlerError>(())
//! });
//! assert_eq!(h.name(), "printer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::event::Event;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// Contract for bus subscribers.
///
/// Invocations for different events may overlap, so implementations must be
/// safe to call concurrently.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Processes one event.
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError>;

    /// Human-readable name (for logs/metrics attribution).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed handler.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        (self.f)(event).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
