//! Outbox relay: drains the durable queue onto the in-process bus.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::outbox::{QueuedMessage, WorkQueue};

/// Consumes the durable work queue and republishes each committed event
/// on the in-process event bus.
///
/// The relay is what separates "the event is durable" from "the event
/// has been observed": a crash between commit and publish loses nothing
/// because the queue redelivers until the publish succeeds. Downstream
/// consumers therefore see at-least-once delivery and must be
/// idempotent.
pub struct OutboxRelay<Q: WorkQueue> {
    queue: Arc<Q>,
    bus: Arc<EventBus>,
}

impl<Q: WorkQueue + 'static> OutboxRelay<Q> {
    pub fn new(queue: Arc<Q>, bus: Arc<EventBus>) -> Self {
        Self { queue, bus }
    }

    /// Spawns the relay loop on the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Runs the relay loop until the queue closes.
    pub async fn run(&self) {
        loop {
            let delivery = match self.queue.dequeue().await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => break,
                Err(error) => {
                    tracing::error!(%error, "work queue dequeue failed, stopping relay");
                    break;
                }
            };

            let QueuedMessage::DomainEvent(event) = &delivery.message;

            match self.bus.publish(event).await {
                Ok(()) => {
                    metrics::counter!("relay_events_delivered").increment(1);
                    if let Err(error) = self.queue.ack(delivery).await {
                        tracing::error!(%error, "failed to ack delivery");
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        event_type = %event.event_type,
                        attempt = delivery.attempt,
                        %error,
                        "publish failed, scheduling redelivery"
                    );
                    metrics::counter!("relay_events_failed").increment(1);
                    if let Err(error) = self.queue.nack(delivery).await {
                        tracing::error!(%error, "failed to nack delivery");
                    }
                }
            }
        }

        tracing::info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventSubscriber, SubscriberError};
    use crate::outbox::InMemoryWorkQueue;
    use crate::{AggregateId, EventEnvelope, TenantId, Version};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        calls: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl Recorder {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(failures),
            })
        }
    }

    #[async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<(), SubscriberError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err("transient".into())
            } else {
                Ok(())
            }
        }
    }

    fn event(n: i64) -> QueuedMessage {
        QueuedMessage::DomainEvent(
            EventEnvelope::builder()
                .tenant_id(TenantId::new("acme"))
                .aggregate_id(AggregateId::new())
                .aggregate_type("TestAggregate")
                .event_type("TestEvent")
                .version(Version::new(n))
                .payload_raw(serde_json::json!({ "n": n }))
                .build(),
        )
    }

    #[tokio::test]
    async fn relays_queued_events_to_bus() {
        let queue = Arc::new(InMemoryWorkQueue::new(3));
        let recorder = Recorder::new(0);
        let bus = Arc::new(
            EventBus::builder()
                .subscribe("TestEvent", recorder.clone())
                .build(),
        );

        queue.enqueue(event(1)).await.unwrap();
        queue.enqueue(event(2)).await.unwrap();
        queue.close();

        OutboxRelay::new(queue, bus).run().await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_publish_is_redelivered() {
        let queue = Arc::new(InMemoryWorkQueue::new(5));
        let recorder = Recorder::new(1);
        let bus = Arc::new(
            EventBus::builder()
                .subscribe("TestEvent", recorder.clone())
                .build(),
        );

        queue.enqueue(event(1)).await.unwrap();

        let relay = OutboxRelay::new(Arc::clone(&queue), bus);
        let handle = relay.spawn();

        // First attempt fails, redelivery succeeds.
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while recorder.calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("redelivery never happened");

        queue.close();
        handle.await.unwrap();

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
        assert!(queue.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn poisoned_event_lands_in_dead_letters() {
        let queue = Arc::new(InMemoryWorkQueue::new(2));
        let recorder = Recorder::new(usize::MAX);
        let bus = Arc::new(
            EventBus::builder()
                .subscribe("TestEvent", recorder.clone())
                .build(),
        );

        queue.enqueue(event(1)).await.unwrap();

        let handle = OutboxRelay::new(Arc::clone(&queue), bus).spawn();

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while queue.dead_letters().is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message never dead-lettered");

        queue.close();
        handle.await.unwrap();

        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 2);
    }
}
