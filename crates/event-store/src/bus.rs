//! In-process event bus fanning relayed events out to subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::EventEnvelope;

/// Error type subscribers may return from `handle`.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of relayed domain events (projector or process manager).
///
/// Delivery is at-least-once: the same event may be handed to a
/// subscriber multiple times, so every implementation must be
/// idempotent. Returning an error makes the relay redeliver the whole
/// envelope.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError>;
}

/// One or more subscribers failed while handling a published event.
#[derive(Debug, Error)]
#[error("publish of {event_type} failed for {} subscriber(s)", .failures.len())]
pub struct PublishError {
    pub event_type: String,
    /// (subscriber name, error message) per failed subscriber.
    pub failures: Vec<(String, String)>,
}

/// Immutable event-type → subscriber routing table.
///
/// Built once at startup via [`EventBusBuilder`]; subscription order is
/// preserved, so projectors registered before process managers are
/// guaranteed to have updated their views by the time a saga for the
/// same event runs.
pub struct EventBus {
    subscribers: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    /// Creates a new bus builder.
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    /// Returns the number of subscribers for an event type.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .get(event_type)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Delivers an event to every subscriber of its type, in
    /// subscription order.
    ///
    /// All subscribers are invoked even when an earlier one fails;
    /// failures are collected so the relay can redeliver the envelope.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn publish(&self, event: &EventEnvelope) -> Result<(), PublishError> {
        let Some(subscribers) = self.subscribers.get(&event.event_type) else {
            return Ok(());
        };

        let mut failures = Vec::new();
        for subscriber in subscribers {
            if let Err(error) = subscriber.handle(event).await {
                tracing::warn!(
                    subscriber = subscriber.name(),
                    event_id = %event.event_id,
                    %error,
                    "subscriber failed to handle event"
                );
                metrics::counter!("bus_subscriber_failures").increment(1);
                failures.push((subscriber.name().to_string(), error.to_string()));
            }
        }

        metrics::counter!("bus_events_published").increment(1);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError {
                event_type: event.event_type.clone(),
                failures,
            })
        }
    }
}

/// Builder collecting subscriptions before the bus is frozen.
#[derive(Default)]
pub struct EventBusBuilder {
    subscribers: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBusBuilder {
    /// Subscribes a handler to one event type.
    pub fn subscribe(
        mut self,
        event_type: impl Into<String>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Self {
        self.subscribers
            .entry(event_type.into())
            .or_default()
            .push(subscriber);
        self
    }

    /// Subscribes a handler to several event types at once.
    pub fn subscribe_all(
        mut self,
        event_types: &[&str],
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Self {
        for event_type in event_types {
            self = self.subscribe(*event_type, Arc::clone(&subscriber));
        }
        self
    }

    /// Freezes the routing table.
    pub fn build(self) -> EventBus {
        EventBus {
            subscribers: self.subscribers,
        }
    }
}
