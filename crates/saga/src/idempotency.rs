//! Idempotency markers for at-least-once event delivery.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use event_store::{EventEnvelope, EventId};

type MarkerKey = (&'static str, EventId, String);

/// Tracks which `(saga, event id, event type)` combinations have been
/// handled, with a TTL so the map does not grow unbounded.
///
/// `try_begin` is check-then-act and not transactional with the
/// downstream command dispatch; a crash between marking and
/// dispatching loses the marker's protection. `release` narrows that
/// window for in-process failures by handing the event back to
/// redelivery.
pub struct IdempotencyStore {
    markers: Mutex<HashMap<MarkerKey, DateTime<Utc>>>,
    ttl: chrono::Duration,
}

impl IdempotencyStore {
    /// Creates a store whose markers expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            markers: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24)),
        }
    }

    /// Claims an event for a saga.
    ///
    /// Returns false when the saga has already handled (or is
    /// handling) this event. Expired markers are swept on each call.
    pub fn try_begin(&self, saga: &'static str, event: &EventEnvelope) -> bool {
        let now = Utc::now();
        let mut markers = self.markers.lock().unwrap();
        markers.retain(|_, marked_at| now - *marked_at < self.ttl);

        let key = (saga, event.event_id, event.event_type.clone());
        if markers.contains_key(&key) {
            metrics::counter!("saga_duplicate_deliveries").increment(1);
            return false;
        }
        markers.insert(key, now);
        true
    }

    /// Releases a claim after a failed handling attempt so the
    /// redelivered event is processed again.
    pub fn release(&self, saga: &'static str, event: &EventEnvelope) {
        let key = (saga, event.event_id, event.event_type.clone());
        self.markers.lock().unwrap().remove(&key);
    }

    /// Number of live markers.
    pub fn len(&self) -> usize {
        self.markers.lock().unwrap().len()
    }

    /// True when no markers are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
