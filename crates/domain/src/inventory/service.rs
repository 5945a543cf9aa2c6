//! Inventory service: the command-side API of the inventory context.

use common::{ProductId, TenantId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ProductStock, ReceiveStock, ReleaseStock, ReserveStock, ShipStock, stock_stream_id};

/// Service for managing product stock.
pub struct InventoryService<S: EventStore> {
    handler: CommandHandler<S, ProductStock>,
}

impl<S: EventStore> InventoryService<S> {
    /// Creates a new inventory service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Receives stock into a `(location, batch)` bucket.
    #[tracing::instrument(skip(self, cmd), fields(product = %cmd.product_id, tenant = %cmd.tenant_id))]
    pub async fn receive_stock(
        &self,
        cmd: ReceiveStock,
    ) -> Result<CommandResult<ProductStock>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let product_id = cmd.product_id.clone();
        let location_id = cmd.location_id.clone();
        let batch_id = cmd.batch_id.clone();
        let quantity = cmd.quantity;

        self.handler
            .execute(&cmd.tenant_id, stream_id, |stock| {
                stock.receive(product_id, location_id, batch_id, quantity)
            })
            .await
    }

    /// Reserves stock for an order.
    ///
    /// A shortage commits a `StockAllocationFailed` event and still
    /// returns `Ok`; callers inspect the committed events to learn the
    /// outcome.
    #[tracing::instrument(skip(self, cmd), fields(product = %cmd.product_id, order = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn reserve_stock(
        &self,
        cmd: ReserveStock,
    ) -> Result<CommandResult<ProductStock>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let order_id = cmd.order_id;
        let quantity = cmd.quantity;
        let allow_partial = cmd.allow_partial;

        self.handler
            .execute(&cmd.tenant_id, stream_id, |stock| {
                stock.reserve(order_id, quantity, allow_partial)
            })
            .await
    }

    /// Releases an order's reservation.
    #[tracing::instrument(skip(self, cmd), fields(product = %cmd.product_id, order = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn release_stock(
        &self,
        cmd: ReleaseStock,
    ) -> Result<CommandResult<ProductStock>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let order_id = cmd.order_id;

        self.handler
            .execute(&cmd.tenant_id, stream_id, |stock| stock.release(order_id))
            .await
    }

    /// Finalizes an order's reservation.
    #[tracing::instrument(skip(self, cmd), fields(product = %cmd.product_id, order = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn ship_stock(
        &self,
        cmd: ShipStock,
    ) -> Result<CommandResult<ProductStock>, DomainError> {
        let stream_id = cmd.aggregate_id();
        let order_id = cmd.order_id;

        self.handler
            .execute(&cmd.tenant_id, stream_id, |stock| stock.ship(order_id))
            .await
    }

    /// Loads the stock position of a product.
    ///
    /// Returns None if nothing was ever received for the product.
    pub async fn get_stock(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<Option<ProductStock>, DomainError> {
        self.handler
            .load_existing(tenant_id, stock_stream_id(product_id))
            .await
    }
}
