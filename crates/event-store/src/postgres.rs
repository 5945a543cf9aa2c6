use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, TenantId, Version,
    outbox::{Delivery, QueuedMessage, WorkQueue},
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// PostgreSQL-backed event store with a transactional outbox.
///
/// The events, the stream version (enforced by the unique
/// `(tenant_id, aggregate_id, version)` constraint), and the outbox
/// rows are written in one transaction, so a committed event is always
/// queued for relay and a lost optimistic race commits nothing.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tenant_id: TenantId::new(row.try_get::<String, _>("tenant_id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first = &events[0];
        let tenant_id = first.tenant_id.clone();
        let aggregate_id = first.aggregate_id;

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_version {
            let current_version: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(version) FROM events WHERE tenant_id = $1 AND aggregate_id = $2",
            )
            .bind(tenant_id.as_str())
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;

            let actual = Version::new(current_version.unwrap_or(0));

            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    tenant_id,
                    aggregate_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(event.tenant_id.as_str())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A unique constraint violation means another writer won
                // the race between our version check and the insert.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_stream_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        tenant_id: event.tenant_id.clone(),
                        aggregate_id,
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;

            let queued = serde_json::to_value(QueuedMessage::DomainEvent(event.clone()))?;
            sqlx::query(
                "INSERT INTO outbox (event_id, tenant_id, payload) VALUES ($1, $2, $3)",
            )
            .bind(event.event_id.as_uuid())
            .bind(event.tenant_id.as_str())
            .bind(queued)
            .execute(&mut *tx)
            .await?;

            last_version = event.version;
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_appended").increment(1);
        Ok(last_version)
    }

    async fn read_stream(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY version ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn read_stream_from(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2 AND version >= $3
            ORDER BY version ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(aggregate_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_version(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM events WHERE tenant_id = $1 AND aggregate_id = $2",
        )
        .bind(tenant_id.as_str())
        .bind(aggregate_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let stream = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            ORDER BY timestamp ASC, version ASC
            "#,
        )
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Ok(Box::pin(stream))
    }
}

/// Work queue reading the transactional outbox table.
///
/// Claims rows with `FOR UPDATE SKIP LOCKED` so several relay instances
/// can poll the same table without double-claiming. Claiming increments
/// the attempt counter; `ack` stamps `dispatched_at`, `nack` marks the
/// row dead once the attempts are exhausted and otherwise leaves it to
/// be claimed again.
#[derive(Clone)]
pub struct PostgresWorkQueue {
    pool: PgPool,
    poll_interval: Duration,
    max_deliveries: u32,
}

impl PostgresWorkQueue {
    pub fn new(pool: PgPool, poll_interval: Duration, max_deliveries: u32) -> Self {
        Self {
            pool,
            poll_interval,
            max_deliveries: max_deliveries.max(1),
        }
    }

    /// Number of outbox rows still awaiting dispatch.
    pub async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox WHERE dispatched_at IS NULL AND NOT dead",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Number of dead-lettered outbox rows.
    pub async fn dead_letter_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE dead")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn claim(&self) -> Result<Option<Delivery>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            UPDATE outbox SET attempts = attempts + 1
            WHERE id = (
                SELECT id FROM outbox
                WHERE dispatched_at IS NULL AND NOT dead
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, payload, attempts
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: serde_json::Value = row.try_get("payload")?;
        let message: QueuedMessage = serde_json::from_value(payload)?;
        let id: i64 = row.try_get("id")?;
        let attempts: i32 = row.try_get("attempts")?;

        Ok(Some(Delivery {
            message,
            attempt: attempts as u32,
            receipt: Some(id),
        }))
    }
}

#[async_trait]
impl WorkQueue for PostgresWorkQueue {
    async fn enqueue(&self, message: QueuedMessage) -> Result<()> {
        let QueuedMessage::DomainEvent(ref event) = message;
        let payload = serde_json::to_value(&message)?;
        sqlx::query("INSERT INTO outbox (event_id, tenant_id, payload) VALUES ($1, $2, $3)")
            .bind(event.event_id.as_uuid())
            .bind(event.tenant_id.as_str())
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Delivery>> {
        loop {
            if let Some(delivery) = self.claim().await? {
                return Ok(Some(delivery));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, delivery: Delivery) -> Result<()> {
        if let Some(id) = delivery.receipt {
            sqlx::query("UPDATE outbox SET dispatched_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> Result<()> {
        if delivery.attempt >= self.max_deliveries
            && let Some(id) = delivery.receipt
        {
            tracing::error!(
                outbox_id = id,
                attempt = delivery.attempt,
                "delivery attempts exhausted, dead-lettering outbox row"
            );
            metrics::counter!("outbox_dead_letters").increment(1);
            sqlx::query("UPDATE outbox SET dead = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
