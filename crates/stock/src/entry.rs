//! Stock entries and movement records.

use chrono::{DateTime, Utc};
use common::{BatchId, LocationId, ProductId};
use serde::{Deserialize, Serialize};

/// Stock on hand in one `(product, location, batch)` bucket.
///
/// Invariant: `reserved_quantity <= quantity`, so the available amount
/// is never negative. Mutated only inside the allocator's atomic
/// commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
    pub reserved_quantity: u64,
}

impl StockEntry {
    /// Creates an empty entry for a bucket.
    pub fn new(
        product_id: impl Into<ProductId>,
        location_id: impl Into<LocationId>,
        batch_id: impl Into<BatchId>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            location_id: location_id.into(),
            batch_id: batch_id.into(),
            quantity: 0,
            reserved_quantity: 0,
        }
    }

    /// Units available for allocation.
    pub fn available(&self) -> u64 {
        self.quantity - self.reserved_quantity
    }
}

/// The kind of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    /// Stock received from outside.
    Inbound,

    /// Stock left the warehouse for good.
    Outbound,

    /// Stock reserved against a reference.
    Allocation,

    /// A reservation returned to availability.
    Release,

    /// Stock arriving at a location during a transfer.
    TransferIn,

    /// Stock leaving a location during a transfer.
    TransferOut,

    /// Finished goods created by a production run.
    ProductionIn,

    /// Raw materials consumed by a production run.
    ProductionOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inbound => "Inbound",
            MovementType::Outbound => "Outbound",
            MovementType::Allocation => "Allocation",
            MovementType::Release => "Release",
            MovementType::TransferIn => "TransferIn",
            MovementType::TransferOut => "TransferOut",
            MovementType::ProductionIn => "ProductionIn",
            MovementType::ProductionOut => "ProductionOut",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Inbound" => Ok(MovementType::Inbound),
            "Outbound" => Ok(MovementType::Outbound),
            "Allocation" => Ok(MovementType::Allocation),
            "Release" => Ok(MovementType::Release),
            "TransferIn" => Ok(MovementType::TransferIn),
            "TransferOut" => Ok(MovementType::TransferOut),
            "ProductionIn" => Ok(MovementType::ProductionIn),
            "ProductionOut" => Ok(MovementType::ProductionOut),
            other => Err(format!("unknown movement type: {other}")),
        }
    }
}

/// Immutable audit record written alongside every entry mutation, in
/// the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
    pub movement_type: MovementType,
    pub reference_id: String,
    pub timestamp: DateTime<Utc>,
}

impl StockMovement {
    /// Creates a movement stamped with the current time.
    pub fn new(
        entry: &StockEntry,
        quantity: u64,
        movement_type: MovementType,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            product_id: entry.product_id.clone(),
            location_id: entry.location_id.clone(),
            batch_id: entry.batch_id.clone(),
            quantity,
            movement_type,
            reference_id: reference_id.into(),
            timestamp: Utc::now(),
        }
    }
}
