//! Manufacturing completion saga.

use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchId, LocationId};
use domain::{InventoryEvent, InventoryService, ManufacturingEvent, ReceiveStock, ReserveStock};
use event_store::{EventEnvelope, EventStore, EventSubscriber, SubscriberError};

use crate::error::SagaError;
use crate::idempotency::IdempotencyStore;

const SAGA_NAME: &str = "ManufacturingSaga";

/// Reacts to `ProductionCompleted` by consuming the raw materials and
/// receiving the finished good into inventory.
///
/// The completion event carries the product and raw-materials list
/// captured at scheduling time, so no stream is re-read here. The
/// production order id becomes the finished good's batch id for
/// traceability.
pub struct ManufacturingSaga<S: EventStore> {
    inventory: Arc<InventoryService<S>>,
    markers: Arc<IdempotencyStore>,
    output_location: LocationId,
}

impl<S: EventStore> ManufacturingSaga<S> {
    pub fn new(
        inventory: Arc<InventoryService<S>>,
        markers: Arc<IdempotencyStore>,
        output_location: LocationId,
    ) -> Self {
        Self {
            inventory,
            markers,
            output_location,
        }
    }

    async fn on_production_completed(&self, event: &EventEnvelope) -> Result<(), SagaError> {
        let ManufacturingEvent::ProductionCompleted(data) =
            serde_json::from_value::<ManufacturingEvent>(event.payload.clone())?
        else {
            return Ok(());
        };

        let tenant_id = event.tenant_id.clone();
        let production_id = event.aggregate_id;

        for material in &data.raw_materials {
            let result = self
                .inventory
                .reserve_stock(ReserveStock::new(
                    tenant_id.clone(),
                    material.product_id.clone(),
                    production_id,
                    material.quantity,
                ))
                .await?;

            if let Some(InventoryEvent::StockAllocationFailed(failed)) = result.events.first() {
                tracing::warn!(
                    %production_id,
                    product = %material.product_id,
                    requested = failed.requested,
                    available = failed.available,
                    "raw material short at production completion"
                );
            }
        }

        self.inventory
            .receive_stock(ReceiveStock::new(
                tenant_id,
                data.product_id.clone(),
                self.output_location.clone(),
                BatchId::new(production_id.to_string()),
                data.quantity,
            ))
            .await?;

        metrics::counter!("productions_booked").increment(1);
        tracing::info!(%production_id, product = %data.product_id, quantity = data.quantity, "finished goods received");

        Ok(())
    }
}

#[async_trait]
impl<S: EventStore + 'static> EventSubscriber for ManufacturingSaga<S> {
    fn name(&self) -> &'static str {
        SAGA_NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError> {
        if !self.markers.try_begin(SAGA_NAME, event) {
            return Ok(());
        }

        if let Err(error) = self.on_production_completed(event).await {
            self.markers.release(SAGA_NAME, event);
            return Err(error.into());
        }

        Ok(())
    }
}
