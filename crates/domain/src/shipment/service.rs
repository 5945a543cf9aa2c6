//! Shipment service: the command-side API of the shipments context.

use common::{AggregateId, TenantId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CreateShipment, ShipPackage, Shipment, shipment_stream_id};

/// Service for managing shipments.
pub struct ShipmentService<S: EventStore> {
    handler: CommandHandler<S, Shipment>,
}

impl<S: EventStore> ShipmentService<S> {
    /// Creates a new shipment service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Creates a shipment for a confirmed order.
    #[tracing::instrument(skip(self, cmd), fields(order = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn create_shipment(
        &self,
        cmd: CreateShipment,
    ) -> Result<CommandResult<Shipment>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let order_id = cmd.order_id;
        let items = cmd.items.clone();
        let address = cmd.shipping_address.clone();

        self.handler
            .execute(&cmd.tenant_id, stream_id, |shipment| {
                shipment.create(order_id, items, address)
            })
            .await
    }

    /// Ships a created package.
    #[tracing::instrument(skip(self, cmd), fields(order = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn ship_package(
        &self,
        cmd: ShipPackage,
    ) -> Result<CommandResult<Shipment>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let tracking_number = cmd.tracking_number.clone();

        self.handler
            .execute(&cmd.tenant_id, stream_id, |shipment| {
                shipment.ship(tracking_number)
            })
            .await
    }

    /// Loads the shipment for an order.
    pub async fn get_shipment_for_order(
        &self,
        tenant_id: &TenantId,
        order_id: AggregateId,
    ) -> Result<Option<Shipment>, DomainError> {
        self.handler
            .load_existing(tenant_id, shipment_stream_id(order_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Money, OrderItem, ShippingAddress};
    use crate::shipment::ShipmentState;
    use event_store::InMemoryEventStore;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn create_command(order_id: AggregateId) -> CreateShipment {
        CreateShipment::new(
            tenant(),
            order_id,
            vec![OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000))],
            ShippingAddress::new("1 Main St", "Springfield", "12345", "US"),
        )
    }

    #[tokio::test]
    async fn create_and_ship() {
        let service = ShipmentService::new(InMemoryEventStore::detached());
        let order_id = AggregateId::new();

        service.create_shipment(create_command(order_id)).await.unwrap();

        let result = service
            .ship_package(ShipPackage::new(tenant(), order_id, "TRACK-123"))
            .await
            .unwrap();
        assert_eq!(result.aggregate.state(), ShipmentState::Shipped);

        let shipment = service
            .get_shipment_for_order(&tenant(), order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shipment.tracking_number(), Some("TRACK-123"));
    }

    #[tokio::test]
    async fn duplicate_create_commits_nothing() {
        let store = InMemoryEventStore::detached();
        let service = ShipmentService::new(store.clone());
        let order_id = AggregateId::new();

        service.create_shipment(create_command(order_id)).await.unwrap();
        let second = service.create_shipment(create_command(order_id)).await.unwrap();

        assert!(second.events.is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn ship_unknown_order_fails() {
        let service = ShipmentService::new(InMemoryEventStore::detached());
        let result = service
            .ship_package(ShipPackage::new(tenant(), AggregateId::new(), "TRACK-1"))
            .await;
        assert!(result.is_err());
    }
}
