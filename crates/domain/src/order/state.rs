//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Rejected
/// ```
///
/// Both outcomes are terminal; once reached, further confirm/reject
/// commands are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order awaits the reservation outcome.
    #[default]
    Pending,

    /// Stock was reserved and the order is confirmed (terminal).
    Confirmed,

    /// The order was rejected (terminal).
    Rejected,
}

impl OrderState {
    /// Returns true if a confirm/reject decision can still be taken.
    pub fn can_decide(&self) -> bool {
        matches!(self, OrderState::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Confirmed | OrderState::Rejected)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "Pending",
            OrderState::Confirmed => "Confirmed",
            OrderState::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
