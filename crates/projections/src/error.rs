//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A conditional view commit lost against a concurrent writer.
    ///
    /// The failed event is redelivered by the relay; there is no
    /// projector-level retry loop.
    #[error("Conflicting concurrent update of view {view} for entity {entity}")]
    Conflict { view: &'static str, entity: String },

    /// An event arrived for an entity the view has never seen.
    #[error("View {view} has no document for entity {entity}")]
    MissingDocument { view: &'static str, entity: String },

    /// A projection-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
