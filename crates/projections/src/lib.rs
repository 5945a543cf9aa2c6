//! Query side: denormalized read views maintained by idempotent
//! projectors, plus the replay service that rebuilds them from the log.

pub mod error;
pub mod projection;
pub mod replay;
pub mod store;
pub mod views;

pub use error::{ProjectionError, Result};
pub use projection::{Projection, ProjectionSubscriber};
pub use replay::ReplayService;
pub use store::ViewStore;
pub use views::order_view::{OrderView, OrderViewDoc};
pub use views::shipment_view::{ShipmentView, ShipmentViewDoc};
pub use views::stock_view::{StockView, StockViewDoc};
