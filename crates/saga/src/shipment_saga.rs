//! Shipment creation saga.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{CreateShipment, ShipmentService};
use event_store::{EventEnvelope, EventStore, EventSubscriber, SubscriberError};
use projections::OrderView;

use crate::error::SagaError;
use crate::idempotency::IdempotencyStore;

const SAGA_NAME: &str = "ShipmentSaga";

/// Reacts to `OrderConfirmed` by creating a shipment.
///
/// Reads the order read view rather than the event, because the
/// confirmation event carries no item or address detail. The view
/// projector is subscribed ahead of this saga, so the document is
/// normally present; when it is not, the error sends the event back
/// for redelivery.
pub struct ShipmentSaga<S: EventStore> {
    shipments: Arc<ShipmentService<S>>,
    order_view: Arc<OrderView>,
    markers: Arc<IdempotencyStore>,
}

impl<S: EventStore> ShipmentSaga<S> {
    pub fn new(
        shipments: Arc<ShipmentService<S>>,
        order_view: Arc<OrderView>,
        markers: Arc<IdempotencyStore>,
    ) -> Self {
        Self {
            shipments,
            order_view,
            markers,
        }
    }

    async fn on_order_confirmed(&self, event: &EventEnvelope) -> Result<(), SagaError> {
        let tenant_id = event.tenant_id.clone();
        let order_id = event.aggregate_id;

        let Some(doc) = self.order_view.get(&tenant_id, order_id).await else {
            return Err(SagaError::MissingView {
                saga: SAGA_NAME,
                entity: order_id.to_string(),
            });
        };

        let Some(address) = doc.shipping_address else {
            return Err(SagaError::MissingView {
                saga: SAGA_NAME,
                entity: order_id.to_string(),
            });
        };

        self.shipments
            .create_shipment(CreateShipment::new(tenant_id, order_id, doc.items, address))
            .await?;

        metrics::counter!("shipments_created").increment(1);
        tracing::info!(%order_id, "shipment created for confirmed order");

        Ok(())
    }
}

#[async_trait]
impl<S: EventStore + 'static> EventSubscriber for ShipmentSaga<S> {
    fn name(&self) -> &'static str {
        SAGA_NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError> {
        if !self.markers.try_begin(SAGA_NAME, event) {
            return Ok(());
        }

        if let Err(error) = self.on_order_confirmed(event).await {
            self.markers.release(SAGA_NAME, event);
            return Err(error.into());
        }

        Ok(())
    }
}
