//! Order read view.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, TenantId};
use domain::{OrderEvent, OrderItem, OrderState, ShippingAddress};
use event_store::{EventEnvelope, EventId};

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::Projection;
use crate::store::ViewStore;

/// Denormalized order document.
#[derive(Debug, Clone)]
pub struct OrderViewDoc {
    pub order_id: AggregateId,
    pub customer_id: Option<String>,
    pub status: OrderState,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub total_cents: i64,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Event ids already applied to this document.
    pub processed: HashSet<EventId>,
}

impl OrderViewDoc {
    fn new(order_id: AggregateId) -> Self {
        Self {
            order_id,
            customer_id: None,
            status: OrderState::Pending,
            items: Vec::new(),
            shipping_address: None,
            total_cents: 0,
            rejection_reason: None,
            updated_at: Utc::now(),
            processed: HashSet::new(),
        }
    }
}

/// Projector maintaining one document per order.
#[derive(Clone)]
pub struct OrderView {
    docs: ViewStore<OrderViewDoc>,
}

impl OrderView {
    pub fn new() -> Self {
        Self {
            docs: ViewStore::new("OrderView"),
        }
    }

    /// Returns the document for one order.
    pub async fn get(&self, tenant_id: &TenantId, order_id: AggregateId) -> Option<OrderViewDoc> {
        self.docs.get(tenant_id, order_id).await
    }

    /// Returns every order document of a tenant.
    pub async fn list(&self, tenant_id: &TenantId) -> Vec<OrderViewDoc> {
        self.docs.list(tenant_id).await
    }
}

impl Default for OrderView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for OrderView {
    fn name(&self) -> &'static str {
        "OrderView"
    }

    fn interests(&self) -> &'static [&'static str] {
        &["OrderInitialized", "OrderConfirmed", "OrderRejected"]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != "Order" {
            return Ok(());
        }

        let order_event: OrderEvent = serde_json::from_value(event.payload.clone())?;
        let order_id = event.aggregate_id;

        let (doc, revision) = self.docs.load(&event.tenant_id, order_id).await;

        let mut doc = match (doc, &order_event) {
            (Some(doc), _) => doc,
            (None, OrderEvent::OrderInitialized(_)) => OrderViewDoc::new(order_id),
            // A decision event raced ahead of the initialization; let
            // the relay redeliver it once the document exists.
            (None, _) => {
                return Err(ProjectionError::MissingDocument {
                    view: self.name(),
                    entity: order_id.to_string(),
                });
            }
        };

        if doc.processed.contains(&event.event_id) {
            return Ok(());
        }

        match order_event {
            OrderEvent::OrderInitialized(data) => {
                doc.customer_id = Some(data.customer_id.to_string());
                doc.total_cents = data
                    .items
                    .iter()
                    .map(|item| item.total_price().cents())
                    .sum();
                doc.items = data.items;
                doc.shipping_address = Some(data.shipping_address);
                doc.status = OrderState::Pending;
                doc.updated_at = data.initialized_at;
            }
            OrderEvent::OrderConfirmed(data) => {
                doc.status = OrderState::Confirmed;
                doc.updated_at = data.confirmed_at;
            }
            OrderEvent::OrderRejected(data) => {
                doc.status = OrderState::Rejected;
                doc.rejection_reason = Some(data.reason);
                doc.updated_at = data.rejected_at;
            }
        }

        doc.processed.insert(event.event_id);
        self.docs
            .store_if(&event.tenant_id, order_id, revision, doc)
            .await
    }

    async fn reset(&self) {
        self.docs.clear().await;
    }
}
