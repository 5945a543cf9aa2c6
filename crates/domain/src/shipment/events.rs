//! Shipment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::order::{OrderItem, ShippingAddress};

/// Events that can occur on a shipment stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShipmentEvent {
    /// A shipment was created for a confirmed order.
    ShipmentCreated(ShipmentCreated),

    /// The package left the warehouse.
    PackageShipped(PackageShipped),
}

impl DomainEvent for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "ShipmentCreated",
            ShipmentEvent::PackageShipped(_) => "PackageShipped",
        }
    }
}

/// Data for ShipmentCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreated {
    /// The order this shipment fulfills.
    pub order_id: AggregateId,

    /// Items in the package, copied from the order view.
    pub items: Vec<OrderItem>,

    /// Delivery address.
    pub shipping_address: ShippingAddress,

    /// When the shipment was created.
    pub created_at: DateTime<Utc>,
}

/// Data for PackageShipped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageShipped {
    /// Carrier tracking number.
    pub tracking_number: String,

    /// When the package left the warehouse.
    pub shipped_at: DateTime<Utc>,
}

impl ShipmentEvent {
    /// Creates a ShipmentCreated event.
    pub fn created(
        order_id: AggregateId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Self {
        ShipmentEvent::ShipmentCreated(ShipmentCreated {
            order_id,
            items,
            shipping_address,
            created_at: Utc::now(),
        })
    }

    /// Creates a PackageShipped event.
    pub fn shipped(tracking_number: impl Into<String>) -> Self {
        ShipmentEvent::PackageShipped(PackageShipped {
            tracking_number: tracking_number.into(),
            shipped_at: Utc::now(),
        })
    }
}
