//! Inventory domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, BatchId, LocationId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// A slice of a reservation taken from one `(location, batch)` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAllocation {
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
}

/// Events that can occur on a product stock stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InventoryEvent {
    /// Stock arrived into a `(location, batch)` bucket.
    StockReceived(StockReceivedData),

    /// Stock was reserved for an order across one or more buckets.
    StockReserved(StockReservedData),

    /// A reservation could not be satisfied.
    ///
    /// Recorded, not thrown: insufficient stock is domain data, and
    /// downstream consumers treat it as a first-class outcome.
    StockAllocationFailed(StockAllocationFailedData),

    /// A reservation was released back to availability.
    StockReleased(StockReleasedData),

    /// A reservation was finalized and left the warehouse.
    StockShipped(StockShippedData),
}

impl DomainEvent for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockReceived(_) => "StockReceived",
            InventoryEvent::StockReserved(_) => "StockReserved",
            InventoryEvent::StockAllocationFailed(_) => "StockAllocationFailed",
            InventoryEvent::StockReleased(_) => "StockReleased",
            InventoryEvent::StockShipped(_) => "StockShipped",
        }
    }
}

/// Data for StockReceived event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceivedData {
    /// The product received.
    pub product_id: ProductId,

    /// Where the stock was put away.
    pub location_id: LocationId,

    /// The receiving lot.
    pub batch_id: BatchId,

    /// Units received.
    pub quantity: u64,

    /// When the stock arrived.
    pub received_at: DateTime<Utc>,
}

/// Data for StockReserved event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReservedData {
    /// The order the reservation belongs to.
    pub order_id: AggregateId,

    /// Per-bucket breakdown of the reservation, in allocation order.
    pub allocations: Vec<BucketAllocation>,

    /// Total units reserved across all buckets.
    pub total_reserved: u64,

    /// When the reservation was made.
    pub reserved_at: DateTime<Utc>,
}

/// Data for StockAllocationFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAllocationFailedData {
    /// The order that requested the reservation.
    pub order_id: AggregateId,

    /// Units requested.
    pub requested: u64,

    /// Units that were available at decision time.
    pub available: u64,

    /// Human-readable failure reason.
    pub reason: String,

    /// When the attempt failed.
    pub failed_at: DateTime<Utc>,
}

/// Data for StockReleased event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReleasedData {
    /// The order whose reservation was released.
    pub order_id: AggregateId,

    /// When the reservation was released.
    pub released_at: DateTime<Utc>,
}

/// Data for StockShipped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockShippedData {
    /// The order whose reservation shipped.
    pub order_id: AggregateId,

    /// When the stock left the warehouse.
    pub shipped_at: DateTime<Utc>,
}

impl InventoryEvent {
    /// Creates a StockReceived event.
    pub fn received(
        product_id: ProductId,
        location_id: LocationId,
        batch_id: BatchId,
        quantity: u64,
    ) -> Self {
        InventoryEvent::StockReceived(StockReceivedData {
            product_id,
            location_id,
            batch_id,
            quantity,
            received_at: Utc::now(),
        })
    }

    /// Creates a StockReserved event.
    pub fn reserved(order_id: AggregateId, allocations: Vec<BucketAllocation>) -> Self {
        let total_reserved = allocations.iter().map(|a| a.quantity).sum();
        InventoryEvent::StockReserved(StockReservedData {
            order_id,
            allocations,
            total_reserved,
            reserved_at: Utc::now(),
        })
    }

    /// Creates a StockAllocationFailed event.
    pub fn allocation_failed(order_id: AggregateId, requested: u64, available: u64) -> Self {
        InventoryEvent::StockAllocationFailed(StockAllocationFailedData {
            order_id,
            requested,
            available,
            reason: "Insufficient Stock".to_string(),
            failed_at: Utc::now(),
        })
    }

    /// Creates a StockReleased event.
    pub fn released(order_id: AggregateId) -> Self {
        InventoryEvent::StockReleased(StockReleasedData {
            order_id,
            released_at: Utc::now(),
        })
    }

    /// Creates a StockShipped event.
    pub fn shipped(order_id: AggregateId) -> Self {
        InventoryEvent::StockShipped(StockShippedData {
            order_id,
            shipped_at: Utc::now(),
        })
    }
}
