//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::manufacturing::ManufacturingError;
use crate::order::OrderError;
use crate::shipment::ShipmentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store. A `ConcurrencyConflict`
    /// surfaces here untouched; retrying is the caller's decision.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An invalid command against the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// An invalid command against the inventory aggregate.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// An invalid command against the production order aggregate.
    #[error("Manufacturing error: {0}")]
    Manufacturing(#[from] ManufacturingError),

    /// An invalid command against the shipment aggregate.
    #[error("Shipment error: {0}")]
    Shipment(#[from] ShipmentError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when the failure is an optimistic-concurrency loss and the
    /// command can be retried from fresh state.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}
