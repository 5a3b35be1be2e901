//! # Logging observer.
//!
//! [`EventLogger`] writes every event it sees through `tracing` under the
//! `modvisor::events` target:
//!
//! ```text
//! INFO modvisor::events: event event_id=6f1c… event_type=intent.detected source=interpreter payload={"intent":"open"}
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modvisor::{EventBus, EventLogger, WILDCARD};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::default();
//! bus.subscribe(WILDCARD, Arc::new(EventLogger)).await;
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::HandlerError;
use crate::events::{Event, Handler};

/// Logs every event at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogger;

#[async_trait]
impl Handler for EventLogger {
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        info!(
            target: "modvisor::events",
            event_id = event.event_id(),
            event_type = event.event_type(),
            source = event.source(),
            payload = %event.payload_json(),
            "event"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "event_logger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_fails() {
        let ev = Arc::new(Event::new("intent.detected", "interpreter").with_field("intent", "open"));
        assert!(EventLogger.handle(ev).await.is_ok());
        assert_eq!(EventLogger.name(), "event_logger");
    }
}
