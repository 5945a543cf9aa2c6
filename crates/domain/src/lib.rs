//! Domain layer for the operations platform.
//!
//! This crate provides the core write-side abstractions:
//! - `Aggregate` and `DomainEvent` traits for event-sourced entities
//! - `CommandHandler` implementing the load → decide → commit cycle
//!   with optimistic concurrency
//! - the four bounded contexts: orders, inventory, manufacturing, and
//!   shipments, each with a typed command set and a service facade

pub mod aggregate;
pub mod command;
pub mod error;
pub mod inventory;
pub mod manufacturing;
pub mod order;
pub mod shipment;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use common::{AggregateId, BatchId, LocationId, ProductId, TenantId};
pub use error::DomainError;
pub use inventory::{
    BucketAllocation, InventoryError, InventoryEvent, InventoryService, ProductStock,
    ReceiveStock, ReleaseStock, ReserveStock, ShipStock, stock_stream_id,
};
pub use manufacturing::{
    CompleteProduction, ManufacturingError, ManufacturingEvent, ManufacturingService,
    ProductionOrder, ProductionState, RawMaterial, ScheduleProduction, StartProduction,
};
pub use order::{
    ConfirmOrder, CustomerId, InitializeOrder, Money, Order, OrderError, OrderEvent, OrderItem,
    OrderService, OrderState, RejectOrder, ShippingAddress,
};
pub use shipment::{
    CreateShipment, PackageShipped, Shipment, ShipmentError, ShipmentEvent, ShipmentService,
    ShipmentState, ShipPackage, shipment_stream_id,
};
