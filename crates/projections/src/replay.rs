//! Replay service: rebuilds read views from the event log.

use std::sync::Arc;

use event_store::{EventBus, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::{Projection, ProjectionSubscriber};

/// Re-delivers historical events to a projector-only bus.
///
/// The rebuild resets every projection, constructs a bus containing
/// only those projections (no sagas, so no commands are re-issued),
/// and streams the full log through it in insertion order.
pub struct ReplayService<S: EventStore> {
    store: S,
}

impl<S: EventStore> ReplayService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Rebuilds the given projections from scratch.
    ///
    /// Returns the number of events replayed.
    #[tracing::instrument(skip(self, projections))]
    pub async fn rebuild(&self, projections: &[Arc<dyn Projection>]) -> Result<u64> {
        for projection in projections {
            projection.reset().await;
        }

        let mut builder = EventBus::builder();
        for projection in projections {
            let subscriber = ProjectionSubscriber::new(Arc::clone(projection));
            for event_type in projection.interests() {
                builder = builder.subscribe(*event_type, subscriber.clone());
            }
        }
        let bus = builder.build();

        let mut stream = self.store.stream_all_events().await?;
        let mut replayed = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            bus.publish(&event).await.map_err(|error| {
                ProjectionError::Projection(format!("replay delivery failed: {error}"))
            })?;
            replayed += 1;
        }

        metrics::counter!("replay_events_delivered").increment(replayed);
        tracing::info!(events = replayed, "view rebuild complete");

        Ok(replayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::order_view::OrderView;
    use common::{AggregateId, TenantId};
    use domain::{CustomerId, DomainEvent, Money, OrderEvent, OrderItem, ShippingAddress};
    use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version};

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn order_envelope(order_id: AggregateId, version: i64, event: &OrderEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .tenant_id(tenant())
            .aggregate_id(order_id)
            .aggregate_type("Order")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
    }

    async fn seed_order(store: &InMemoryEventStore, order_id: AggregateId) {
        let init = OrderEvent::initialized(
            order_id,
            CustomerId::new(),
            vec![OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000))],
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US"),
        );
        store
            .append(
                vec![
                    order_envelope(order_id, 1, &init),
                    order_envelope(order_id, 2, &OrderEvent::confirmed()),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rebuild_replays_full_history() {
        let store = InMemoryEventStore::detached();
        let o1 = AggregateId::new();
        let o2 = AggregateId::new();
        seed_order(&store, o1).await;
        seed_order(&store, o2).await;

        let view = Arc::new(OrderView::new());
        let projections: Vec<Arc<dyn Projection>> = vec![view.clone()];

        let replay = ReplayService::new(store);
        let replayed = replay.rebuild(&projections).await.unwrap();

        assert_eq!(replayed, 4);
        assert!(view.get(&tenant(), o1).await.is_some());
        assert!(view.get(&tenant(), o2).await.is_some());
    }

    #[tokio::test]
    async fn rebuild_resets_before_replaying() {
        let store = InMemoryEventStore::detached();
        let order_id = AggregateId::new();
        seed_order(&store, order_id).await;

        let view = Arc::new(OrderView::new());
        let projections: Vec<Arc<dyn Projection>> = vec![view.clone()];
        let replay = ReplayService::new(store);

        // Rebuilding twice must not double-apply anything.
        replay.rebuild(&projections).await.unwrap();
        replay.rebuild(&projections).await.unwrap();

        let doc = view.get(&tenant(), order_id).await.unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.total_cents, 2000);
    }

    #[tokio::test]
    async fn rebuild_of_empty_store_is_zero() {
        let store = InMemoryEventStore::detached();
        let view: Arc<dyn Projection> = Arc::new(OrderView::new());
        let replay = ReplayService::new(store);
        assert_eq!(replay.rebuild(&[view]).await.unwrap(), 0);
    }
}
