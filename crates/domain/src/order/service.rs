//! Order service: the command-side API of the orders context.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{ConfirmOrder, InitializeOrder, Order, RejectOrder};

/// Service for managing orders.
///
/// One instance per process, constructed by the platform and shared by
/// reference with every caller (HTTP use cases and sagas alike).
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Initializes a new order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn initialize_order(
        &self,
        cmd: InitializeOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.order_id;
        let customer_id = cmd.customer_id;
        let items = cmd.items.clone();
        let address = cmd.shipping_address.clone();

        self.handler
            .execute(&cmd.tenant_id, order_id, |order| {
                order.initialize(order_id, customer_id, items, address)
            })
            .await
    }

    /// Confirms a pending order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn confirm_order(
        &self,
        cmd: ConfirmOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(&cmd.tenant_id, cmd.order_id, |order| order.confirm())
            .await
    }

    /// Rejects a pending order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, tenant = %cmd.tenant_id))]
    pub async fn reject_order(
        &self,
        cmd: RejectOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let reason = cmd.reason.clone();
        self.handler
            .execute(&cmd.tenant_id, cmd.order_id, |order| order.reject(reason))
            .await
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    pub async fn get_order(
        &self,
        tenant_id: &common::TenantId,
        order_id: AggregateId,
    ) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(tenant_id, order_id).await
    }
}
