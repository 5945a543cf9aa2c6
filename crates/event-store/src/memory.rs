use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, TenantId, Version,
    outbox::{InMemoryWorkQueue, QueuedMessage},
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct StreamState {
    version: Version,
    events: Vec<EventEnvelope>,
}

#[derive(Default)]
struct StoreState {
    streams: HashMap<(TenantId, AggregateId), StreamState>,
    log: Vec<EventEnvelope>,
}

/// In-memory event store implementation.
///
/// Used by tests and by single-process deployments without a database.
/// The write lock is held across the version check, the event writes,
/// and the outbox enqueue, which gives the same atomicity guarantee the
/// PostgreSQL implementation gets from its transaction.
#[derive(Clone)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<StoreState>>,
    queue: Arc<InMemoryWorkQueue>,
}

impl InMemoryEventStore {
    /// Creates a store that enqueues committed events on `queue`.
    pub fn new(queue: Arc<InMemoryWorkQueue>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            queue,
        }
    }

    /// Creates a store with a detached queue, for tests that don't
    /// exercise the relay.
    pub fn detached() -> Self {
        Self::new(Arc::new(InMemoryWorkQueue::new(3)))
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.log.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first = &events[0];
        let tenant_id = first.tenant_id.clone();
        let aggregate_id = first.aggregate_id;
        let key = (tenant_id.clone(), aggregate_id);

        let mut state = self.state.write().await;
        let current = state
            .streams
            .get(&key)
            .map(|s| s.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                tenant_id,
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Even without an explicit expectation, a batch stamped against
        // a stale version lost the race.
        if first.version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                tenant_id,
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let last_version = events.last().map(|e| e.version).unwrap_or(current);

        for event in &events {
            self.queue.push(QueuedMessage::DomainEvent(event.clone()))?;
        }

        let stream = state.streams.entry(key).or_default();
        stream.version = last_version;
        stream.events.extend(events.iter().cloned());
        state.log.extend(events);

        metrics::counter!("event_store_events_appended").increment(1);

        Ok(last_version)
    }

    async fn read_stream(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&(tenant_id.clone(), aggregate_id))
            .map(|s| s.events.clone())
            .unwrap_or_default())
    }

    async fn read_stream_from(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&(tenant_id.clone(), aggregate_id))
            .map(|s| {
                s.events
                    .iter()
                    .filter(|e| e.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn stream_version(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<Version>> {
        let state = self.state.read().await;
        Ok(state
            .streams
            .get(&(tenant_id.clone(), aggregate_id))
            .map(|s| s.version))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let events = state.log.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::WorkQueue;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn create_test_event(
        aggregate_id: AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .tenant_id(tenant())
            .aggregate_id(aggregate_id)
            .aggregate_type("TestAggregate")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_single_event() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();
        let event = create_test_event(aggregate_id, Version::first(), "TestEvent");

        let result = store.append(vec![event], AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::first());

        let events = store.read_stream(&tenant(), aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn append_multiple_events() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "Event1"),
            create_test_event(aggregate_id, Version::new(2), "Event2"),
            create_test_event(aggregate_id, Version::new(3), "Event3"),
        ];

        let result = store.append(events, AppendOptions::expect_new()).await;
        assert_eq!(result.unwrap(), Version::new(3));

        let stored = store.read_stream(&tenant(), aggregate_id).await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "Event1");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        // A writer hydrated from the empty stream is stale now.
        let event2 = create_test_event(aggregate_id, Version::first(), "Event2");
        let result = store
            .append(vec![event2], AppendOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn append_with_correct_expected_version() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "Event1");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        let event2 = create_test_event(aggregate_id, Version::new(2), "Event2");
        let result = store
            .append(
                vec![event2],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn concurrent_appends_have_exactly_one_winner() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let a = store.append(
            vec![create_test_event(aggregate_id, Version::first(), "A")],
            AppendOptions::expect_new(),
        );
        let b = store.append(
            vec![create_test_event(aggregate_id, Version::first(), "B")],
            AppendOptions::expect_new(),
        );

        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.is_ok() as u8 + rb.is_ok() as u8, 1);

        let events = store.read_stream(&tenant(), aggregate_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            store.stream_version(&tenant(), aggregate_id).await.unwrap(),
            Some(Version::first())
        );
    }

    #[tokio::test]
    async fn versions_are_contiguous() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        for n in 1..=5 {
            let event = create_test_event(aggregate_id, Version::new(n), "Event");
            store
                .append(vec![event], AppendOptions::expect_version(Version::new(n - 1)))
                .await
                .unwrap();
        }

        let events = store.read_stream(&tenant(), aggregate_id).await.unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn read_stream_from_version() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "Event1"),
            create_test_event(aggregate_id, Version::new(2), "Event2"),
            create_test_event(aggregate_id, Version::new(3), "Event3"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        let from_v2 = store
            .read_stream_from(&tenant(), aggregate_id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(from_v2.len(), 2);
        assert_eq!(from_v2[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryEventStore::detached();
        let aggregate_id = AggregateId::new();

        let mut event = create_test_event(aggregate_id, Version::first(), "Event1");
        event.tenant_id = TenantId::new("acme");
        store
            .append(vec![event], AppendOptions::expect_new())
            .await
            .unwrap();

        // Same aggregate id under another tenant starts at version 0.
        let mut event = create_test_event(aggregate_id, Version::first(), "Event1");
        event.tenant_id = TenantId::new("globex");
        store
            .append(vec![event], AppendOptions::expect_new())
            .await
            .unwrap();

        let acme = store
            .read_stream(&TenantId::new("acme"), aggregate_id)
            .await
            .unwrap();
        let globex = store
            .read_stream(&TenantId::new("globex"), aggregate_id)
            .await
            .unwrap();
        assert_eq!(acme.len(), 1);
        assert_eq!(globex.len(), 1);
    }

    #[tokio::test]
    async fn committed_events_are_enqueued_for_relay() {
        let queue = Arc::new(InMemoryWorkQueue::new(3));
        let store = InMemoryEventStore::new(Arc::clone(&queue));
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "Event1"),
            create_test_event(aggregate_id, Version::new(2), "Event2"),
        ];
        store.append(events, AppendOptions::expect_new()).await.unwrap();

        queue.close();
        let mut relayed = Vec::new();
        while let Some(delivery) = queue.dequeue().await.unwrap() {
            let QueuedMessage::DomainEvent(event) = delivery.message;
            relayed.push(event.version.as_i64());
        }
        assert_eq!(relayed, vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_append_enqueues_nothing() {
        let queue = Arc::new(InMemoryWorkQueue::new(3));
        let store = InMemoryEventStore::new(Arc::clone(&queue));
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "Event1")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "Loser")],
                AppendOptions::expect_new(),
            )
            .await;
        assert!(result.is_err());

        queue.close();
        let mut count = 0;
        while queue.dequeue().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn stream_all_events_preserves_insertion_order() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::detached();
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();

        store
            .append(
                vec![create_test_event(id1, Version::first(), "First")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![create_test_event(id2, Version::first(), "Second")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let stream = store.stream_all_events().await.unwrap();
        let events: Vec<_> = stream.map(|r| r.unwrap().event_type).collect().await;
        assert_eq!(events, vec!["First".to_string(), "Second".to_string()]);
    }
}
