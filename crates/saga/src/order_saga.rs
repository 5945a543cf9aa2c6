//! Order fulfillment saga.

use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::{
    ConfirmOrder, InventoryEvent, InventoryService, OrderEvent, OrderService, RejectOrder,
    ReleaseStock, ReserveStock,
};
use event_store::{EventEnvelope, EventStore, EventSubscriber, SubscriberError};

use crate::error::SagaError;
use crate::idempotency::IdempotencyStore;

const SAGA_NAME: &str = "OrderSaga";

/// Reacts to `OrderInitialized` by reserving stock for every line item
/// and confirming or rejecting the order on the outcome.
///
/// The reservation calls are request/response: each command returns its
/// committed events and the saga branches on them. When a later line
/// fails, the lines already reserved are released before the order is
/// rejected, so no reservation is stranded.
pub struct OrderSaga<S: EventStore> {
    orders: Arc<OrderService<S>>,
    inventory: Arc<InventoryService<S>>,
    markers: Arc<IdempotencyStore>,
}

impl<S: EventStore> OrderSaga<S> {
    pub fn new(
        orders: Arc<OrderService<S>>,
        inventory: Arc<InventoryService<S>>,
        markers: Arc<IdempotencyStore>,
    ) -> Self {
        Self {
            orders,
            inventory,
            markers,
        }
    }

    async fn on_order_initialized(&self, event: &EventEnvelope) -> Result<(), SagaError> {
        let OrderEvent::OrderInitialized(data) =
            serde_json::from_value::<OrderEvent>(event.payload.clone())?
        else {
            return Ok(());
        };

        let tenant_id = event.tenant_id.clone();
        let order_id = data.order_id;

        let mut reserved: Vec<(ProductId, u64)> = Vec::new();
        let mut failure: Option<String> = None;

        for item in &data.items {
            let command = ReserveStock::new(
                tenant_id.clone(),
                item.product_id.clone(),
                order_id,
                item.quantity as u64,
            );

            match self.inventory.reserve_stock(command).await {
                Ok(result) => {
                    let failed = result.events.iter().find_map(|e| match e {
                        InventoryEvent::StockAllocationFailed(data) => {
                            Some(data.reason.clone())
                        }
                        _ => None,
                    });

                    if let Some(reason) = failed {
                        failure = Some(reason);
                        break;
                    }
                    reserved.push((item.product_id.clone(), item.quantity as u64));
                }
                Err(error) => {
                    failure = Some(error.to_string());
                    break;
                }
            }
        }

        match failure {
            None => {
                self.orders
                    .confirm_order(ConfirmOrder::new(tenant_id, order_id))
                    .await?;
                metrics::counter!("orders_confirmed").increment(1);
                tracing::info!(%order_id, "order confirmed after reservation");
            }
            Some(reason) => {
                // Undo the lines that did reserve before rejecting.
                for (product_id, _) in &reserved {
                    if let Err(error) = self
                        .inventory
                        .release_stock(ReleaseStock::new(
                            tenant_id.clone(),
                            product_id.clone(),
                            order_id,
                        ))
                        .await
                    {
                        tracing::error!(%order_id, %product_id, %error, "failed to release reservation during compensation");
                    }
                }

                self.orders
                    .reject_order(RejectOrder::new(tenant_id, order_id, reason.clone()))
                    .await?;
                metrics::counter!("orders_rejected").increment(1);
                tracing::info!(%order_id, %reason, "order rejected");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<S: EventStore + 'static> EventSubscriber for OrderSaga<S> {
    fn name(&self) -> &'static str {
        SAGA_NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), SubscriberError> {
        if !self.markers.try_begin(SAGA_NAME, event) {
            return Ok(());
        }

        if let Err(error) = self.on_order_initialized(event).await {
            self.markers.release(SAGA_NAME, event);
            return Err(error.into());
        }

        Ok(())
    }
}
