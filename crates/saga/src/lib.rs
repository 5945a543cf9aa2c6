//! Process managers (sagas) for the operations platform.
//!
//! Sagas subscribe to cross-context events and translate them into
//! commands against other contexts' services:
//!
//! - order saga: `OrderInitialized` → reserve stock → confirm/reject
//! - manufacturing saga: `ProductionCompleted` → consume raw
//!   materials, receive the finished good
//! - shipment saga: `OrderConfirmed` → create the shipment from the
//!   order read view
//!
//! Delivery is at-least-once, so every saga checks a TTL'd
//! idempotency marker before acting and releases it when handling
//! fails, letting the relay's redelivery retry the step.

pub mod error;
pub mod idempotency;
pub mod manufacturing_saga;
pub mod order_saga;
pub mod shipment_saga;

pub use error::SagaError;
pub use idempotency::IdempotencyStore;
pub use manufacturing_saga::ManufacturingSaga;
pub use order_saga::OrderSaga;
pub use shipment_saga::ShipmentSaga;
