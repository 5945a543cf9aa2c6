//! Core projection trait and the bus adapter.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::{EventEnvelope, EventSubscriber, SubscriberError};

use crate::Result;

/// A projection that folds events into a denormalized read view.
///
/// Delivery is at-least-once, so `handle` must be idempotent: views
/// track the event ids they have already applied and re-application is
/// a no-op. A returned error makes the relay redeliver the event.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// The event types this projection consumes.
    ///
    /// Used to wire the projection into the event bus and the replay
    /// bus.
    fn interests(&self) -> &'static [&'static str];

    /// Handles a single event, updating the read view.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Resets the view to its initial state (used before a replay).
    async fn reset(&self);
}

/// Adapts a [`Projection`] to the event bus subscriber contract.
pub struct ProjectionSubscriber {
    projection: Arc<dyn Projection>,
}

impl ProjectionSubscriber {
    pub fn new(projection: Arc<dyn Projection>) -> Arc<Self> {
        Arc::new(Self { projection })
    }
}

#[async_trait]
impl EventSubscriber for ProjectionSubscriber {
    fn name(&self) -> &'static str {
        self.projection.name()
    }

    async fn handle(&self, event: &EventEnvelope) -> std::result::Result<(), SubscriberError> {
        self.projection.handle(event).await?;
        metrics::counter!("projection_events_applied").increment(1);
        Ok(())
    }
}
