//! Stock allocation engine.
//!
//! The synchronous, non-event-sourced counterpart to the inventory
//! aggregate, used by direct-call use cases (receive, transfer,
//! produce, reserve on behalf of an order). It shares the same
//! concurrency discipline as the event store: every writer re-reads,
//! recomputes, and retries on conflict; nothing is ever locked.

pub mod allocator;
pub mod entry;
pub mod error;
pub mod postgres;
pub mod store;

pub use allocator::{AllocationRequest, AllocatorConfig, ProducedStock, StockAllocator};
pub use entry::{MovementType, StockEntry, StockMovement};
pub use error::{Result, StockError};
pub use postgres::PostgresStockStore;
pub use store::{EntryWrite, InMemoryStockStore, StockStore, VersionedEntry};
