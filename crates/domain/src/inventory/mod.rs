//! Inventory bounded context.
//!
//! Stock for each product lives on its own stream, derived
//! deterministically from the product id, so every command and
//! redelivered event targets the same stream.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{ProductStock, StockBucket};
pub use commands::{ReceiveStock, ReleaseStock, ReserveStock, ShipStock};
pub use events::{BucketAllocation, InventoryEvent};
pub use service::InventoryService;

use common::{AggregateId, ProductId};
use thiserror::Error;

/// Returns the stream id of the stock aggregate for a product.
pub fn stock_stream_id(product_id: &ProductId) -> AggregateId {
    AggregateId::derived(&format!("inventory/{product_id}"))
}

/// Errors produced by the inventory aggregate.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Quantities must be positive.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: u64 },

    /// The stream already tracks a different product.
    #[error("Stream tracks product {existing}, got {given}")]
    ProductMismatch { existing: String, given: String },
}
