//! Shipment state machine.

use serde::{Deserialize, Serialize};

/// The state of a shipment.
///
/// State transitions:
/// ```text
/// Created ──► Shipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShipmentState {
    /// Shipment exists and awaits dispatch.
    #[default]
    Created,

    /// The package left the warehouse (terminal).
    Shipped,
}

impl ShipmentState {
    /// Returns true if the package can be shipped in this state.
    pub fn can_ship(&self) -> bool {
        matches!(self, ShipmentState::Created)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentState::Created => "Created",
            ShipmentState::Shipped => "Shipped",
        }
    }
}

impl std::fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
