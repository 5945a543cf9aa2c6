use thiserror::Error;

use crate::{AggregateId, TenantId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for stream {tenant_id}/{aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The event batch handed to `append` was malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// The durable work queue rejected an enqueue (shutting down).
    #[error("Work queue is closed")]
    QueueClosed,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
