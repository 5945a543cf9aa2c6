//! Shipment read view.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, TenantId};
use domain::{OrderItem, ShipmentEvent, ShipmentState, ShippingAddress, shipment_stream_id};
use event_store::{EventEnvelope, EventId};

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::Projection;
use crate::store::ViewStore;

/// Denormalized shipment document.
#[derive(Debug, Clone)]
pub struct ShipmentViewDoc {
    pub order_id: Option<AggregateId>,
    pub status: ShipmentState,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub tracking_number: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Event ids already applied to this document.
    pub processed: HashSet<EventId>,
}

impl ShipmentViewDoc {
    fn new() -> Self {
        Self {
            order_id: None,
            status: ShipmentState::Created,
            items: Vec::new(),
            shipping_address: None,
            tracking_number: None,
            updated_at: Utc::now(),
            processed: HashSet::new(),
        }
    }
}

/// Projector maintaining one document per shipment.
#[derive(Clone)]
pub struct ShipmentView {
    docs: ViewStore<ShipmentViewDoc>,
}

impl ShipmentView {
    pub fn new() -> Self {
        Self {
            docs: ViewStore::new("ShipmentView"),
        }
    }

    /// Returns the shipment document for an order.
    pub async fn get_for_order(
        &self,
        tenant_id: &TenantId,
        order_id: AggregateId,
    ) -> Option<ShipmentViewDoc> {
        self.docs.get(tenant_id, shipment_stream_id(order_id)).await
    }

    /// Returns every shipment document of a tenant.
    pub async fn list(&self, tenant_id: &TenantId) -> Vec<ShipmentViewDoc> {
        self.docs.list(tenant_id).await
    }
}

impl Default for ShipmentView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for ShipmentView {
    fn name(&self) -> &'static str {
        "ShipmentView"
    }

    fn interests(&self) -> &'static [&'static str] {
        &["ShipmentCreated", "PackageShipped"]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != "Shipment" {
            return Ok(());
        }

        let shipment_event: ShipmentEvent = serde_json::from_value(event.payload.clone())?;
        let entity_id = event.aggregate_id;

        let (doc, revision) = self.docs.load(&event.tenant_id, entity_id).await;

        let mut doc = match (doc, &shipment_event) {
            (Some(doc), _) => doc,
            (None, ShipmentEvent::ShipmentCreated(_)) => ShipmentViewDoc::new(),
            (None, _) => {
                return Err(ProjectionError::MissingDocument {
                    view: self.name(),
                    entity: entity_id.to_string(),
                });
            }
        };

        if doc.processed.contains(&event.event_id) {
            return Ok(());
        }

        match shipment_event {
            ShipmentEvent::ShipmentCreated(data) => {
                doc.order_id = Some(data.order_id);
                doc.items = data.items;
                doc.shipping_address = Some(data.shipping_address);
                doc.status = ShipmentState::Created;
                doc.updated_at = data.created_at;
            }
            ShipmentEvent::PackageShipped(data) => {
                doc.status = ShipmentState::Shipped;
                doc.tracking_number = Some(data.tracking_number);
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
