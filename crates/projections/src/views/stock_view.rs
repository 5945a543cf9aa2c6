//! Stock level read view.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, TenantId};
use domain::{InventoryEvent, stock_stream_id};
use event_store::{EventEnvelope, EventId};

use crate::Result;
use crate::projection::Projection;
use crate::store::ViewStore;

/// Denormalized stock document for one product.
///
/// Keeps the per-order allocations so release/ship events, which carry
/// only the order id, can be applied without reading the stream.
#[derive(Debug, Clone)]
pub struct StockViewDoc {
    pub product_id: Option<ProductId>,
    pub total_quantity: u64,
    pub reserved_quantity: u64,
    /// location → batch → on-hand units.
    pub locations: HashMap<String, HashMap<String, u64>>,
    /// order id → (location, batch, quantity) allocations.
    pub reservations: HashMap<String, Vec<(String, String, u64)>>,
    pub updated_at: DateTime<Utc>,
    /// Event ids already applied to this document.
    pub processed: HashSet<EventId>,
}

impl StockViewDoc {
    fn new() -> Self {
        Self {
            product_id: None,
            total_quantity: 0,
            reserved_quantity: 0,
            locations: HashMap::new(),
            reservations: HashMap::new(),
            updated_at: Utc::now(),
            processed: HashSet::new(),
        }
    }

    /// Units available for reservation.
    pub fn available(&self) -> u64 {
        self.total_quantity - self.reserved_quantity
    }
}

/// Projector maintaining one stock document per product.
#[derive(Clone)]
pub struct StockView {
    docs: ViewStore<StockViewDoc>,
}

impl StockView {
    pub fn new() -> Self {
        Self {
            docs: ViewStore::new("StockView"),
        }
    }

    /// Returns the stock document for one product.
    pub async fn get(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Option<StockViewDoc> {
        self.docs.get(tenant_id, stock_stream_id(product_id)).await
    }

    /// Returns every stock document of a tenant.
    pub async fn list(&self, tenant_id: &TenantId) -> Vec<StockViewDoc> {
        self.docs.list(tenant_id).await
    }
}

impl Default for StockView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for StockView {
    fn name(&self) -> &'static str {
        "StockView"
    }

    fn interests(&self) -> &'static [&'static str] {
        &[
            "StockReceived",
            "StockReserved",
            "StockAllocationFailed",
            "StockReleased",
            "StockShipped",
        ]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != "ProductStock" {
            return Ok(());
        }

        let inventory_event: InventoryEvent = serde_json::from_value(event.payload.clone())?;
        let entity_id = event.aggregate_id;

        let (doc, revision) = self.docs.load(&event.tenant_id, entity_id).await;
        let mut doc = doc.unwrap_or_else(StockViewDoc::new);

        if doc.processed.contains(&event.event_id) {
            return Ok(());
        }

        match inventory_event {
            InventoryEvent::StockReceived(data) => {
                doc.product_id = Some(data.product_id);
                doc.total_quantity += data.quantity;
                *doc.locations
                    .entry(data.location_id.as_str().to_string())
                    .or_default()
                    .entry(data.batch_id.as_str().to_string())
                    .or_default() += data.quantity;
                doc.updated_at = data.received_at;
            }
            InventoryEvent::StockReserved(data) => {
                doc.reserved_quantity += data.total_reserved;
                doc.reservations.insert(
                    data.order_id.to_string(),
                    data.allocations
                        .iter()
                        .map(|a| {
                            (
                                a.location_id.as_str().to_string(),
                                a.batch_id.as_str().to_string(),
                                a.quantity,
                            )
                        })
                        .collect(),
                );
                doc.updated_at = data.reserved_at;
            }
            InventoryEvent::StockAllocationFailed(data) => {
                doc.updated_at = data.failed_at;
            }
            InventoryEvent::StockReleased(data) => {
                if let Some(allocations) = doc.reservations.remove(&data.order_id.to_string()) {
                    let released: u64 = allocations.iter().map(|(_, _, q)| q).sum();
                    doc.reserved_quantity = doc.reserved_quantity.saturating_sub(released);
                }
                doc.updated_at = data.released_at;
            }
            InventoryEvent::StockShipped(data) => {
                if let Some(allocations) = doc.reservations.remove(&data.order_id.to_string()) {
                    for (location, batch, quantity) in allocations {
                        doc.total_quantity = doc.total_quantity.saturating_sub(quantity);
                        doc.reserved_quantity = doc.reserved_quantity.saturating_sub(quantity);
                        if let Some(batches) = doc.locations.get_mut(&location)
                            && let Some(on_hand) = batches.get_mut(&batch)
                        {
                            *on_hand = on_hand.saturating_sub(quantity);
                        }
                    }
                }
                doc.updated_at = data.shipped_at;
            }
        }

        doc.processed.insert(event.event_id);
        self.docs
            .store_if(&event.tenant_id, entity_id, revision, doc)
            .await
    }

    async fn reset(&self) {
        self.docs.clear().await;
    }
}
