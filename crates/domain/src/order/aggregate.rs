//! Order aggregate implementation.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    CustomerId, OrderError, OrderEvent, OrderItem, OrderState, ShippingAddress,
    events::{OrderInitializedData, OrderRejectedData},
};

/// Order aggregate root.
///
/// An order is initialized with its full item list and address, then
/// confirmed or rejected exactly once by the reservation outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    customer_id: Option<CustomerId>,

    state: OrderState,

    items: Vec<OrderItem>,

    shipping_address: Option<ShippingAddress>,

    rejection_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderInitialized(data) => self.apply_initialized(data),
            OrderEvent::OrderConfirmed(_) => {
                self.state = OrderState::Confirmed;
            }
            OrderEvent::OrderRejected(data) => self.apply_rejected(data),
        }
    }
}

// Query methods
impl Order {
    /// Returns the customer ID.
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Returns the ordered items.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the shipping address.
    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    /// Returns the rejection reason, if the order was rejected.
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Returns the total amount of the order.
    pub fn total_amount(&self) -> super::Money {
        self.items
            .iter()
            .fold(super::Money::zero(), |acc, item| acc + item.total_price())
    }

    /// Returns the total quantity across all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Initializes a new order.
    pub fn initialize(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyInitialized);
        }

        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
        }

        Ok(vec![OrderEvent::initialized(
            order_id,
            customer_id,
            items,
            shipping_address,
        )])
    }

    /// Confirms the order.
    ///
    /// Confirming a terminal order is a no-op, not an error; the saga
    /// may redeliver its decision.
    pub fn confirm(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotInitialized);
        }

        if self.state.is_terminal() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::confirmed()])
    }

    /// Rejects the order with a reason.
    ///
    /// Rejecting a terminal order is a no-op, not an error.
    pub fn reject(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotInitialized);
        }

        if self.state.is_terminal() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::rejected(reason)])
    }
}

// Apply event helpers
impl Order {
    fn apply_initialized(&mut self, data: OrderInitializedData) {
        self.id = Some(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.items = data.items;
        self.shipping_address = Some(data.shipping_address);
        self.state = OrderState::Pending;
    }

    fn apply_rejected(&mut self, data: OrderRejectedData) {
        self.state = OrderState::Rejected;
        self.rejection_reason = Some(data.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Money;

    fn initialized_order() -> (Order, AggregateId) {
        let mut order = Order::default();
        let order_id = AggregateId::new();
        let events = order
            .initialize(
                order_id,
                CustomerId::new(),
                vec![OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000))],
                ShippingAddress::new("1 Main St", "Springfield", "12345", "US"),
            )
            .unwrap();
        order.apply_events(events);
        (order, order_id)
    }

    #[test]
    fn initialize_order() {
        let (order, order_id) = initialized_order();
        assert_eq!(order.id(), Some(order_id));
        assert_eq!(order.state(), OrderState::Pending);
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.total_amount().cents(), 2000);
        assert_eq!(order.total_quantity(), 2);
    }

    #[test]
    fn initialize_twice_fails() {
        let (order, _) = initialized_order();
        let result = order.initialize(
            AggregateId::new(),
            CustomerId::new(),
            vec![OrderItem::new("SKU-002", "Gadget", 1, Money::from_cents(500))],
            ShippingAddress::new("2 Oak Ave", "Shelbyville", "54321", "US"),
        );
        assert!(matches!(result, Err(OrderError::AlreadyInitialized)));
    }

    #[test]
    fn initialize_without_items_fails() {
        let order = Order::default();
        let result = order.initialize(
            AggregateId::new(),
            CustomerId::new(),
            vec![],
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US"),
        );
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn initialize_with_zero_quantity_fails() {
        let order = Order::default();
        let result = order.initialize(
            AggregateId::new(),
            CustomerId::new(),
            vec![OrderItem::new("SKU-001", "Widget", 0, Money::from_cents(1000))],
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US"),
        );
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn confirm_pending_order() {
        let (mut order, _) = initialized_order();
        let events = order.confirm().unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);
        assert_eq!(order.state(), OrderState::Confirmed);
        assert!(order.is_terminal());
    }

    #[test]
    fn reject_pending_order() {
        let (mut order, _) = initialized_order();
        let events = order.reject("Insufficient Stock").unwrap();
        order.apply_events(events);
        assert_eq!(order.state(), OrderState::Rejected);
        assert_eq!(order.rejection_reason(), Some("Insufficient Stock"));
    }

    #[test]
    fn confirm_terminal_order_is_noop() {
        let (mut order, _) = initialized_order();
        order.apply_events(order.confirm().unwrap());

        assert!(order.confirm().unwrap().is_empty());
        assert!(order.reject("late").unwrap().is_empty());
        assert_eq!(order.state(), OrderState::Confirmed);
    }

    #[test]
    fn reject_then_confirm_is_noop() {
        let (mut order, _) = initialized_order();
        order.apply_events(order.reject("Insufficient Stock").unwrap());

        assert!(order.confirm().unwrap().is_empty());
        assert_eq!(order.state(), OrderState::Rejected);
    }

    #[test]
    fn decide_before_initialize_fails() {
        let order = Order::default();
        assert!(matches!(order.confirm(), Err(OrderError::NotInitialized)));
        assert!(matches!(
            order.reject("nope"),
            Err(OrderError::NotInitialized)
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        let (order, order_id) = initialized_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), Some(order_id));
        assert_eq!(back.items().len(), 1);
    }
}
