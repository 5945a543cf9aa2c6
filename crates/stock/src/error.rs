//! Stock allocation error types.

use thiserror::Error;

/// Errors that can occur during stock allocation operations.
#[derive(Debug, Error)]
pub enum StockError {
    /// Not enough available stock to satisfy a request.
    ///
    /// Raised before any write: the whole batch aborts, nothing is
    /// partially reserved.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: String,
        requested: u64,
        available: u64,
    },

    /// An optimistic write lost the race. Retried internally by the
    /// allocator; surfaces only from the store layer.
    #[error("Conflicting concurrent stock update")]
    Conflict,

    /// The retry attempts were exhausted without winning a commit.
    #[error("Stock operation timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// No movements were found for a reference.
    #[error("No allocation found for reference {reference_id}")]
    UnknownReference { reference_id: String },

    /// The backing store failed.
    #[error("Stock storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for StockError {
    fn from(error: sqlx::Error) -> Self {
        StockError::Storage(error.to_string())
    }
}

/// Result type for stock operations.
pub type Result<T> = std::result::Result<T, StockError>;
