//! Manufacturing domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// A raw material consumed by one production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// Events that can occur on a production order stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ManufacturingEvent {
    /// A production run was scheduled.
    ProductionScheduled(ProductionScheduledData),

    /// The production run started.
    ProductionStarted(ProductionStartedData),

    /// The production run finished.
    ///
    /// Carries the product and raw-materials list captured at
    /// scheduling time so consumers react without re-querying the
    /// stream.
    ProductionCompleted(ProductionCompletedData),
}

impl DomainEvent for ManufacturingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ManufacturingEvent::ProductionScheduled(_) => "ProductionScheduled",
            ManufacturingEvent::ProductionStarted(_) => "ProductionStarted",
            ManufacturingEvent::ProductionCompleted(_) => "ProductionCompleted",
        }
    }
}

/// Data for ProductionScheduled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionScheduledData {
    /// The production order id.
    pub production_id: AggregateId,

    /// The finished good being produced.
    pub product_id: ProductId,

    /// Units to produce.
    pub quantity: u64,

    /// Raw materials the run will consume.
    pub raw_materials: Vec<RawMaterial>,

    /// When the run was scheduled.
    pub scheduled_at: DateTime<Utc>,
}

/// Data for ProductionStarted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionStartedData {
    /// When the run started.
    pub started_at: DateTime<Utc>,
}

/// Data for ProductionCompleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionCompletedData {
    /// The finished good produced.
    pub product_id: ProductId,

    /// Units produced.
    pub quantity: u64,

    /// Raw materials consumed, captured at scheduling time.
    pub raw_materials: Vec<RawMaterial>,

    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

impl ManufacturingEvent {
    /// Creates a ProductionScheduled event.
    pub fn scheduled(
        production_id: AggregateId,
        product_id: ProductId,
        quantity: u64,
        raw_materials: Vec<RawMaterial>,
    ) -> Self {
        ManufacturingEvent::ProductionScheduled(ProductionScheduledData {
            production_id,
            product_id,
            quantity,
            raw_materials,
            scheduled_at: Utc::now(),
        })
    }

    /// Creates a ProductionStarted event.
    pub fn started() -> Self {
        ManufacturingEvent::ProductionStarted(ProductionStartedData {
            started_at: Utc::now(),
        })
    }

    /// Creates a ProductionCompleted event.
    pub fn completed(
        product_id: ProductId,
        quantity: u64,
        raw_materials: Vec<RawMaterial>,
    ) -> Self {
        ManufacturingEvent::ProductionCompleted(ProductionCompletedData {
            product_id,
            quantity,
            raw_materials,
            completed_at: Utc::now(),
        })
    }
}
