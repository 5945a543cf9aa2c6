//! Manufacturing bounded context.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;

pub use aggregate::ProductionOrder;
pub use commands::{CompleteProduction, ScheduleProduction, StartProduction};
pub use events::{ManufacturingEvent, RawMaterial};
pub use service::ManufacturingService;
pub use state::ProductionState;

use thiserror::Error;

/// Errors produced by the production order aggregate.
#[derive(Debug, Error)]
pub enum ManufacturingError {
    /// The production order stream already exists.
    #[error("Production order has already been scheduled")]
    AlreadyScheduled,

    /// A command arrived before the order was scheduled.
    #[error("Production order has not been scheduled")]
    NotScheduled,

    /// The command is not valid in the current state.
    #[error("Cannot {action} a production order in {current} state")]
    InvalidTransition {
        current: ProductionState,
        action: &'static str,
    },

    /// A production order must produce at least one unit.
    #[error("Invalid production quantity {quantity}")]
    InvalidQuantity { quantity: u64 },
}
