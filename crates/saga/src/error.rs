//! Saga error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while a saga handles an event.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A downstream command failed.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The event payload could not be deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A read view the saga depends on has not caught up yet.
    ///
    /// Surfacing this makes the relay redeliver the event, by which
    /// time the projector has usually done its work.
    #[error("Saga {saga} found no view document for {entity}")]
    MissingView { saga: &'static str, entity: String },
}
