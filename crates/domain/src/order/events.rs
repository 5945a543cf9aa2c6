//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CustomerId, OrderItem, ShippingAddress};

/// Events that can occur on an order stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was initialized with its items and delivery address.
    OrderInitialized(OrderInitializedData),

    /// Stock was reserved and the order is confirmed.
    OrderConfirmed(OrderConfirmedData),

    /// The order was rejected.
    ///
    /// A recorded business outcome, not an error: downstream consumers
    /// treat it as a first-class terminal state.
    OrderRejected(OrderRejectedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderInitialized(_) => "OrderInitialized",
            OrderEvent::OrderConfirmed(_) => "OrderConfirmed",
            OrderEvent::OrderRejected(_) => "OrderRejected",
        }
    }
}

/// Data for OrderInitialized event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInitializedData {
    /// The unique order ID.
    pub order_id: AggregateId,

    /// The customer who placed the order.
    pub customer_id: CustomerId,

    /// The ordered line items.
    pub items: Vec<OrderItem>,

    /// Where the order ships to.
    pub shipping_address: ShippingAddress,

    /// When the order was initialized.
    pub initialized_at: DateTime<Utc>,
}

/// Data for OrderConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    /// When the order was confirmed.
    pub confirmed_at: DateTime<Utc>,
}

/// Data for OrderRejected event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectedData {
    /// Why the order was rejected.
    pub reason: String,

    /// When the order was rejected.
    pub rejected_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Creates an OrderInitialized event.
    pub fn initialized(
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Self {
        OrderEvent::OrderInitialized(OrderInitializedData {
            order_id,
            customer_id,
            items,
            shipping_address,
            initialized_at: Utc::now(),
        })
    }

    /// Creates an OrderConfirmed event.
    pub fn confirmed() -> Self {
        OrderEvent::OrderConfirmed(OrderConfirmedData {
            confirmed_at: Utc::now(),
        })
    }

    /// Creates an OrderRejected event.
    pub fn rejected(reason: impl Into<String>) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Money;

    #[test]
    fn event_types() {
        let items = vec![OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(100))];
        let address = ShippingAddress::new("1 Main St", "Springfield", "12345", "US");

        let event = OrderEvent::initialized(AggregateId::new(), CustomerId::new(), items, address);
        assert_eq!(event.event_type(), "OrderInitialized");

        assert_eq!(OrderEvent::confirmed().event_type(), "OrderConfirmed");
        assert_eq!(
            OrderEvent::rejected("Insufficient Stock").event_type(),
            "OrderRejected"
        );
    }

    #[test]
    fn rejected_event_roundtrip() {
        let event = OrderEvent::rejected("Insufficient Stock");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("OrderRejected"));

        let back: OrderEvent = serde_json::from_str(&json).unwrap();
        if let OrderEvent::OrderRejected(data) = back {
            assert_eq!(data.reason, "Insufficient Stock");
        } else {
            panic!("Expected OrderRejected event");
        }
    }
}
