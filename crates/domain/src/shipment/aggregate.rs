//! Shipment aggregate implementation.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::order::{OrderItem, ShippingAddress};

use super::{ShipmentError, ShipmentEvent, ShipmentState, events::ShipmentCreated};

/// Shipment aggregate root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shipment {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_id: Option<AggregateId>,

    items: Vec<OrderItem>,

    shipping_address: Option<ShippingAddress>,

    state: ShipmentState,

    tracking_number: Option<String>,
}

impl Aggregate for Shipment {
    type Event = ShipmentEvent;
    type Error = ShipmentError;

    fn aggregate_type() -> &'static str {
        "Shipment"
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
            ShipmentEvent::ShipmentCreated(data) => self.apply_created(data),
            ShipmentEvent::PackageShipped(data) => {
                self.state = ShipmentState::Shipped;
                self.tracking_number = Some(data.tracking_number);
            }
        }
    }
}

// Query methods
impl Shipment {
    /// Returns the order this shipment fulfills.
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    /// Returns the packaged items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the delivery address.
    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    /// Returns the current state.
    pub fn state(&self) -> ShipmentState {
        self.state
    }

    /// Returns the tracking number once shipped.
    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }
}

// Command methods (return events)
impl Shipment {
    /// Creates the shipment.
    ///
    /// Idempotent per stream: a create against an existing shipment is
    /// a no-op, which makes redelivered saga commands harmless.
    pub fn create(
        &self,
        order_id: AggregateId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![ShipmentEvent::created(
            order_id,
            items,
            shipping_address,
        )])
    }

    /// Ships the package with a tracking number.
    pub fn ship(
        &self,
        tracking_number: impl Into<String>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }

        if !self.state.can_ship() {
            return Err(ShipmentError::AlreadyShipped);
        }

        Ok(vec![ShipmentEvent::shipped(tracking_number)])
    }
}

// Apply event helpers
impl Shipment {
    fn apply_created(&mut self, data: ShipmentCreated) {
        self.id = Some(super::shipment_stream_id(data.order_id));
        self.order_id = Some(data.order_id);
        self.items = data.items;
        self.shipping_address = Some(data.shipping_address);
        self.state = ShipmentState::Created;
    }
}
