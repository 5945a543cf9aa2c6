//! Production order state machine.

use serde::{Deserialize, Serialize};

/// The state of a production order.
///
/// State transitions:
/// ```text
/// Scheduled ──► InProgress ──► Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductionState {
    /// Production is planned but has not begun.
    #[default]
    Scheduled,

    /// Production is running.
    InProgress,

    /// Production finished (terminal).
    Completed,
}

impl ProductionState {
    /// Returns true if production can start in this state.
    pub fn can_start(&self) -> bool {
        matches!(self, ProductionState::Scheduled)
    }

    /// Returns true if production can complete in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, ProductionState::InProgress)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionState::Scheduled => "Scheduled",
            ProductionState::InProgress => "InProgress",
            ProductionState::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ProductionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
