//! Shipment bounded context.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::Shipment;
pub use commands::{CreateShipment, ShipPackage};
pub use events::{PackageShipped, ShipmentEvent};
pub use service::ShipmentService;
pub use state::ShipmentState;

use common::AggregateId;
use thiserror::Error;

/// Returns the stream id of the shipment for an order.
///
/// Deterministic, so a redelivered `OrderConfirmed` always targets the
/// same shipment stream and the idempotent create stays a no-op.
pub fn shipment_stream_id(order_id: AggregateId) -> AggregateId {
    AggregateId::derived(&format!("shipment/{order_id}"))
}

/// Errors produced by the shipment aggregate.
#[derive(Debug, Error)]
pub enum ShipmentError {
    /// A ship command arrived before the shipment was created.
    #[error("Shipment has not been created")]
    NotCreated,

    /// The package already left the warehouse.
    #[error("Package has already been shipped")]
    AlreadyShipped,
}
