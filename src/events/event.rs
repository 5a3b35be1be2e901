//! # Messages exchanged on the event bus.
//!
//! An [`Event`] is an immutable value: it is built by a producer, handed to
//! [`EventBus::publish`](crate::EventBus::publish) and from then on shared as
//! `Arc<Event>` with every matching handler and with the history ring.
//!
//! `event_id` (UUID v4) and `created_at` (UTC wall clock) are assigned at
//! construction unless the producer supplies them.
//!
//! ## Example
//! ```rust
//! use modvisor::Event;
//! use serde_json::json;
//!
//! let ev = Event::new("audio.sampled", "audio.listener")
//!     .with_field("level", json!(0.42))
//!     .with_field("channel", json!("left"));
//!
//! assert_eq!(ev.event_type(), "audio.sampled");
//! assert_eq!(ev.source(), "audio.listener");
//! assert_eq!(ev.payload().keys().collect::<Vec<_>>(), ["level", "channel"]);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Event type matching every published event.
pub const WILDCARD: &str = "*";

/// Ordered string → JSON value map carried by an event.
pub type Payload = Map<String, Value>;

/// Structured message emitted by a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_type: String,
    payload: Payload,
    source: String,
    event_id: String,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event with an empty payload, a fresh id and the current time.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Payload::new(),
            source: source.into(),
            event_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Replaces the payload.
    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Appends (or overwrites) a single payload entry, preserving insertion order.
    #[inline]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Overrides the generated event id.
    #[inline]
    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    /// Overrides the construction timestamp.
    #[inline]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns `true` if a subscription under `event_type` should see this event.
    #[inline]
    pub fn matches(&self, event_type: &str) -> bool {
        event_type == WILDCARD || self.event_type == event_type
    }

    /// Renders the payload as compact JSON (for logs).
    pub fn payload_json(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_else(|_| format!("{:?}", self.payload))
    }
}
