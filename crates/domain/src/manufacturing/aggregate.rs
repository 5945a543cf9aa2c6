//! Production order aggregate implementation.

use common::{AggregateId, ProductId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    ManufacturingError, ManufacturingEvent, ProductionState, RawMaterial,
    events::ProductionScheduledData,
};

/// Production order aggregate root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionOrder {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    product_id: Option<ProductId>,

    quantity: u64,

    raw_materials: Vec<RawMaterial>,

    state: ProductionState,
}

impl Aggregate for ProductionOrder {
    type Event = ManufacturingEvent;
    type Error = ManufacturingError;

    fn aggregate_type() -> &'static str {
        "ProductionOrder"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ManufacturingEvent::ProductionScheduled(data) => self.apply_scheduled(data),
            ManufacturingEvent::ProductionStarted(_) => {
                self.state = ProductionState::InProgress;
            }
            ManufacturingEvent::ProductionCompleted(_) => {
                self.state = ProductionState::Completed;
            }
        }
    }
}

// Query methods
impl ProductionOrder {
    /// Returns the finished good being produced.
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    /// Returns the units to produce.
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Returns the raw materials captured at scheduling time.
    pub fn raw_materials(&self) -> &[RawMaterial] {
        &self.raw_materials
    }

    /// Returns the current state.
    pub fn state(&self) -> ProductionState {
        self.state
    }
}

// Command methods (return events)
impl ProductionOrder {
    /// Schedules a new production run.
    pub fn schedule(
        &self,
        production_id: AggregateId,
        product_id: ProductId,
        quantity: u64,
        raw_materials: Vec<RawMaterial>,
    ) -> Result<Vec<ManufacturingEvent>, ManufacturingError> {
        if self.id.is_some() {
            return Err(ManufacturingError::AlreadyScheduled);
        }

        if quantity == 0 {
            return Err(ManufacturingError::InvalidQuantity { quantity });
        }

        Ok(vec![ManufacturingEvent::scheduled(
            production_id,
            product_id,
            quantity,
            raw_materials,
        )])
    }

    /// Starts the scheduled run.
    pub fn start(&self) -> Result<Vec<ManufacturingEvent>, ManufacturingError> {
        if self.id.is_none() {
            return Err(ManufacturingError::NotScheduled);
        }

        if !self.state.can_start() {
            return Err(ManufacturingError::InvalidTransition {
                current: self.state,
                action: "start",
            });
        }

        Ok(vec![ManufacturingEvent::started()])
    }

    /// Completes the running production.
    ///
    /// The completion event carries the product and raw-materials list
    /// captured at scheduling time forward.
    pub fn complete(&self) -> Result<Vec<ManufacturingEvent>, ManufacturingError> {
        if self.id.is_none() {
            return Err(ManufacturingError::NotScheduled);
        }

        if !self.state.can_complete() {
            return Err(ManufacturingError::InvalidTransition {
                current: self.state,
                action: "complete",
            });
        }

        let product_id = self
            .product_id
            .clone()
            .ok_or(ManufacturingError::NotScheduled)?;

        Ok(vec![ManufacturingEvent::completed(
            product_id,
            self.quantity,
            self.raw_materials.clone(),
        )])
    }
}

// Apply event helpers
impl ProductionOrder {
    fn apply_scheduled(&mut self, data: ProductionScheduledData) {
        self.id = Some(data.production_id);
        self.product_id = Some(data.product_id);
        self.quantity = data.quantity;
        self.raw_materials = data.raw_materials;
        self.state = ProductionState::Scheduled;
    }
}
