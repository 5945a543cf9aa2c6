//! Product stock aggregate implementation.

use std::collections::HashMap;

use common::{AggregateId, BatchId, LocationId, ProductId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    BucketAllocation, InventoryError, InventoryEvent,
    events::{StockReceivedData, StockReservedData},
};

/// One `(location, batch)` stock bucket.
///
/// Buckets are kept in receipt order; reservations drain them
/// oldest-received-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBucket {
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
    pub reserved: u64,
}

impl StockBucket {
    /// Units still available for reservation in this bucket.
    pub fn available(&self) -> u64 {
        self.quantity - self.reserved
    }
}

/// Event-sourced stock position of one product.
///
/// Holds the per-bucket quantities plus the open reservations keyed by
/// order id, so release/ship commands can find what they reverse or
/// finalize without any external lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductStock {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    product_id: Option<ProductId>,

    /// Buckets in receipt order (FIFO allocation order).
    buckets: Vec<StockBucket>,

    /// Open reservations by order id.
    reservations: HashMap<AggregateId, Vec<BucketAllocation>>,
}

impl Aggregate for ProductStock {
    type Event = InventoryEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "ProductStock"
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
            InventoryEvent::StockReceived(data) => self.apply_received(data),
            InventoryEvent::StockReserved(data) => self.apply_reserved(data),
            InventoryEvent::StockAllocationFailed(_) => {}
            InventoryEvent::StockReleased(data) => self.apply_released(data.order_id),
            InventoryEvent::StockShipped(data) => self.apply_shipped(data.order_id),
        }
    }
}

// Query methods
impl ProductStock {
    /// Returns the product tracked by this stream.
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    /// Returns the buckets in receipt order.
    pub fn buckets(&self) -> &[StockBucket] {
        &self.buckets
    }

    /// Total units on hand across all buckets.
    pub fn total_quantity(&self) -> u64 {
        self.buckets.iter().map(|b| b.quantity).sum()
    }

    /// Total units reserved across all buckets.
    pub fn total_reserved(&self) -> u64 {
        self.buckets.iter().map(|b| b.reserved).sum()
    }

    /// Total units available for reservation.
    pub fn total_available(&self) -> u64 {
        self.buckets.iter().map(|b| b.available()).sum()
    }

    /// Returns the open reservation for an order, if any.
    pub fn reservation(&self, order_id: &AggregateId) -> Option<&[BucketAllocation]> {
        self.reservations.get(order_id).map(|a| a.as_slice())
    }
}

// Command methods (return events)
impl ProductStock {
    /// Records stock arriving into a `(location, batch)` bucket.
    pub fn receive(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        batch_id: BatchId,
        quantity: u64,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: product_id.to_string(),
                quantity,
            });
        }

        if let Some(existing) = &self.product_id
            && existing != &product_id
        {
            return Err(InventoryError::ProductMismatch {
                existing: existing.to_string(),
                given: product_id.to_string(),
            });
        }

        Ok(vec![InventoryEvent::received(
            product_id,
            location_id,
            batch_id,
            quantity,
        )])
    }

    /// Reserves stock for an order, allocating oldest-received-first.
    ///
    /// Shortage is a recorded outcome (`StockAllocationFailed`), never
    /// an error: callers branch on the committed events. Re-reserving
    /// an order that already holds a reservation is a no-op.
    pub fn reserve(
        &self,
        order_id: AggregateId,
        quantity: u64,
        allow_partial: bool,
    ) -> Result<Vec<InventoryEvent>, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: self
                    .product_id
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                quantity,
            });
        }

        if self.reservations.contains_key(&order_id) {
            return Ok(vec![]);
        }

        let available = self.total_available();
        if available == 0 || (!allow_partial && available < quantity) {
            return Ok(vec![InventoryEvent::allocation_failed(
                order_id, quantity, available,
            )]);
        }

        let mut remaining = quantity.min(available);
        let mut allocations = Vec::new();
        for bucket in &self.buckets {
            if remaining == 0 {
                break;
            }
            let take = bucket.available().min(remaining);
            if take == 0 {
                continue;
            }
            allocations.push(BucketAllocation {
                location_id: bucket.location_id.clone(),
                batch_id: bucket.batch_id.clone(),
                quantity: take,
            });
            remaining -= take;
        }

        Ok(vec![InventoryEvent::reserved(order_id, allocations)])
    }

    /// Releases an order's reservation back to availability.
    ///
    /// Releasing an unknown or already-released reservation is a no-op.
    pub fn release(&self, order_id: AggregateId) -> Result<Vec<InventoryEvent>, InventoryError> {
        if !self.reservations.contains_key(&order_id) {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::released(order_id)])
    }

    /// Finalizes an order's reservation, removing the stock on hand.
    ///
    /// Shipping an unknown or already-shipped reservation is a no-op.
    pub fn ship(&self, order_id: AggregateId) -> Result<Vec<InventoryEvent>, InventoryError> {
        if !self.reservations.contains_key(&order_id) {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::shipped(order_id)])
    }
}

// Apply event helpers
impl ProductStock {
    fn apply_received(&mut self, data: StockReceivedData) {
        if self.id.is_none() {
            self.id = Some(super::stock_stream_id(&data.product_id));
        }
        self.product_id = Some(data.product_id);

        if let Some(bucket) = self
            .buckets
            .iter_mut()
            .find(|b| b.location_id == data.location_id && b.batch_id == data.batch_id)
        {
            bucket.quantity += data.quantity;
        } else {
            self.buckets.push(StockBucket {
                location_id: data.location_id,
                batch_id: data.batch_id,
                quantity: data.quantity,
                reserved: 0,
            });
        }
    }

    fn apply_reserved(&mut self, data: StockReservedData) {
        for allocation in &data.allocations {
            if let Some(bucket) = self.buckets.iter_mut().find(|b| {
                b.location_id == allocation.location_id && b.batch_id == allocation.batch_id
            }) {
                bucket.reserved += allocation.quantity;
            }
        }
        self.reservations.insert(data.order_id, data.allocations);
    }

    fn apply_released(&mut self, order_id: AggregateId) {
        if let Some(allocations) = self.reservations.remove(&order_id) {
            for allocation in allocations {
                if let Some(bucket) = self.buckets.iter_mut().find(|b| {
                    b.location_id == allocation.location_id && b.batch_id == allocation.batch_id
                }) {
                    bucket.reserved = bucket.reserved.saturating_sub(allocation.quantity);
                }
            }
        }
    }

    fn apply_shipped(&mut self, order_id: AggregateId) {
        if let Some(allocations) = self.reservations.remove(&order_id) {
            for allocation in allocations {
                if let Some(bucket) = self.buckets.iter_mut().find(|b| {
                    b.location_id == allocation.location_id && b.batch_id == allocation.batch_id
                }) {
                    bucket.quantity = bucket.quantity.saturating_sub(allocation.quantity);
                    bucket.reserved = bucket.reserved.saturating_sub(allocation.quantity);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductId {
        ProductId::new("SKU-001")
    }

    fn receive(stock: &mut ProductStock, location: &str, batch: &str, quantity: u64) {
        let events = stock
            .receive(
                product(),
                LocationId::new(location),
                BatchId::new(batch),
                quantity,
            )
            .unwrap();
        stock.apply_events(events);
    }

    #[test]
    fn receive_creates_bucket() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        assert_eq!(stock.total_quantity(), 10);
        assert_eq!(stock.total_available(), 10);
        assert_eq!(stock.buckets().len(), 1);
    }

    #[test]
    fn receive_same_bucket_accumulates() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);
        receive(&mut stock, "L1", "B1", 5);

        assert_eq!(stock.buckets().len(), 1);
        assert_eq!(stock.total_quantity(), 15);
    }

    #[test]
    fn receive_zero_quantity_fails() {
        let stock = ProductStock::default();
        let result = stock.receive(product(), LocationId::new("L1"), BatchId::new("B1"), 0);
        assert!(matches!(result, Err(InventoryError::InvalidQuantity { .. })));
    }

    #[test]
    fn receive_other_product_fails() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let result = stock.receive(
            ProductId::new("SKU-999"),
            LocationId::new("L1"),
            BatchId::new("B2"),
            5,
        );
        assert!(matches!(result, Err(InventoryError::ProductMismatch { .. })));
    }

    #[test]
    fn reserve_allocates_fifo_across_buckets() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);
        receive(&mut stock, "L1", "B2", 5);

        let order_id = AggregateId::new();
        let events = stock.reserve(order_id, 12, false).unwrap();
        stock.apply_events(events.clone());

        let InventoryEvent::StockReserved(data) = &events[0] else {
            panic!("Expected StockReserved event");
        };
        assert_eq!(data.total_reserved, 12);
        assert_eq!(data.allocations.len(), 2);
        assert_eq!(data.allocations[0].batch_id, BatchId::new("B1"));
        assert_eq!(data.allocations[0].quantity, 10);
        assert_eq!(data.allocations[1].batch_id, BatchId::new("B2"));
        assert_eq!(data.allocations[1].quantity, 2);

        assert_eq!(stock.total_reserved(), 12);
        assert_eq!(stock.total_available(), 3);
    }

    #[test]
    fn reserve_with_zero_stock_records_failure() {
        let stock = ProductStock::default();
        let order_id = AggregateId::new();

        let events = stock.reserve(order_id, 10, false).unwrap();

        let InventoryEvent::StockAllocationFailed(data) = &events[0] else {
            panic!("Expected StockAllocationFailed event");
        };
        assert_eq!(data.reason, "Insufficient Stock");
        assert_eq!(data.available, 0);
        assert_eq!(data.requested, 10);
        assert!(stock.reservation(&order_id).is_none());
    }

    #[test]
    fn reserve_beyond_available_without_partial_records_failure() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 5);

        let events = stock.reserve(AggregateId::new(), 10, false).unwrap();
        assert!(matches!(
            events[0],
            InventoryEvent::StockAllocationFailed(_)
        ));
    }

    #[test]
    fn partial_reserve_takes_what_is_available() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 5);

        let order_id = AggregateId::new();
        let events = stock.reserve(order_id, 10, true).unwrap();
        stock.apply_events(events.clone());

        let InventoryEvent::StockReserved(data) = &events[0] else {
            panic!("Expected StockReserved event");
        };
        assert_eq!(data.total_reserved, 5);
        assert_eq!(stock.total_available(), 0);
    }

    #[test]
    fn duplicate_reserve_is_noop() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let order_id = AggregateId::new();
        stock.apply_events(stock.reserve(order_id, 4, false).unwrap());

        let second = stock.reserve(order_id, 4, false).unwrap();
        assert!(second.is_empty());
        assert_eq!(stock.total_reserved(), 4);
    }

    #[test]
    fn release_restores_availability() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let order_id = AggregateId::new();
        stock.apply_events(stock.reserve(order_id, 6, false).unwrap());
        assert_eq!(stock.total_available(), 4);

        stock.apply_events(stock.release(order_id).unwrap());
        assert_eq!(stock.total_available(), 10);
        assert_eq!(stock.total_quantity(), 10);
        assert!(stock.reservation(&order_id).is_none());
    }

    #[test]
    fn release_unknown_reservation_is_noop() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let events = stock.release(AggregateId::new()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn ship_removes_stock_on_hand() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let order_id = AggregateId::new();
        stock.apply_events(stock.reserve(order_id, 6, false).unwrap());
        stock.apply_events(stock.ship(order_id).unwrap());

        assert_eq!(stock.total_quantity(), 4);
        assert_eq!(stock.total_reserved(), 0);
        assert!(stock.reservation(&order_id).is_none());
    }

    #[test]
    fn double_ship_is_noop() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);

        let order_id = AggregateId::new();
        stock.apply_events(stock.reserve(order_id, 6, false).unwrap());
        stock.apply_events(stock.ship(order_id).unwrap());

        assert!(stock.ship(order_id).unwrap().is_empty());
        assert_eq!(stock.total_quantity(), 4);
    }

    #[test]
    fn conservation_invariant_holds_through_lifecycle() {
        let mut stock = ProductStock::default();
        receive(&mut stock, "L1", "B1", 10);
        receive(&mut stock, "L2", "B2", 8);

        let o1 = AggregateId::new();
        let o2 = AggregateId::new();

        stock.apply_events(stock.reserve(o1, 7, false).unwrap());
        assert!(stock.total_reserved() <= stock.total_quantity());

        stock.apply_events(stock.reserve(o2, 9, false).unwrap());
        assert!(stock.total_reserved() <= stock.total_quantity());

        stock.apply_events(stock.release(o1).unwrap());
        assert!(stock.total_reserved() <= stock.total_quantity());
        assert_eq!(stock.total_quantity(), 18);

        stock.apply_events(stock.ship(o2).unwrap());
        assert_eq!(stock.total_quantity(), 9);
        assert_eq!(stock.total_reserved(), 0);
    }
}
