//! Order bounded context.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{ConfirmOrder, InitializeOrder, RejectOrder};
pub use events::OrderEvent;
pub use service::OrderService;
pub use state::OrderState;
pub use value_objects::{CustomerId, Money, OrderItem, ShippingAddress};

use thiserror::Error;

/// Errors produced by the order aggregate.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order stream already contains an initialization event.
    #[error("Order has already been initialized")]
    AlreadyInitialized,

    /// A decision command arrived before the order was initialized.
    #[error("Order has not been initialized")]
    NotInitialized,

    /// An order must contain at least one item.
    #[error("Order has no items")]
    NoItems,

    /// An item carried a zero quantity.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: u32 },
}
