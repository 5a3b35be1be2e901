//! Bounded FIFO of the most recent events across all types.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::event::Event;

/// Fixed-capacity ring of published events; the oldest entry is evicted first.
pub(crate) struct History {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: Arc<Event>) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Last `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Arc<Event>> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Events matching `event_type` (or all for the wildcard) created at or after `since`, oldest first.
    pub fn matching(
        &self,
        event_type: &str,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<Arc<Event>> {
        self.events
            .iter()
            .filter(|ev| ev.matches(event_type))
            .filter(|ev| since.map_or(true, |at| ev.created_at() >= at))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn ev(ty: &str, id: &str) -> Arc<Event> {
        Arc::new(Event::new(ty, "test").with_id(id))
    }

    fn ids(events: &[Arc<Event>]) -> Vec<&str> {
        events.iter().map(|e| e.event_id()).collect()
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut h = History::new(3);
        for id in ["A", "B", "C", "D"] {
            h.push(ev("t", id));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(ids(&h.recent(10)), ["B", "C", "D"]);
        assert_eq!(ids(&h.recent(2)), ["C", "D"]);
        assert!(h.recent(0).is_empty());
    }

    #[test]
    fn matching_filters_type_time_and_limit() {
        let base = Utc::now();
        let mut h = History::new(10);
        h.push(Arc::new(
            Event::new("a", "s").with_id("a1").with_created_at(base - ChronoDuration::seconds(10)),
        ));
        h.push(Arc::new(Event::new("b", "s").with_id("b1").with_created_at(base)));
        h.push(Arc::new(Event::new("a", "s").with_id("a2").with_created_at(base)));
        h.push(Arc::new(
            Event::new("a", "s").with_id("a3").with_created_at(base + ChronoDuration::seconds(1)),
        ));

        assert_eq!(ids(&h.matching("a", None, None)), ["a1", "a2", "a3"]);
        assert_eq!(ids(&h.matching("a", Some(base), None)), ["a2", "a3"]);
        assert_eq!(ids(&h.matching("*", Some(base), Some(2))), ["b1", "a2"]);
        assert!(h.matching("missing", None, None).is_empty());
    }
}
