//! Manufacturing service: the command-side API of the manufacturing context.

use common::{AggregateId, TenantId};
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CompleteProduction, ProductionOrder, ScheduleProduction, StartProduction};

/// Service for managing production orders.
pub struct ManufacturingService<S: EventStore> {
    handler: CommandHandler<S, ProductionOrder>,
}

impl<S: EventStore> ManufacturingService<S> {
    /// Creates a new manufacturing service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Schedules a production run.
    #[tracing::instrument(skip(self, cmd), fields(production = %cmd.production_id, tenant = %cmd.tenant_id))]
    pub async fn schedule_production(
        &self,
        cmd: ScheduleProduction,
    ) -> Result<CommandResult<ProductionOrder>, DomainError> {
        let production_id = cmd.production_id;
        let product_id = cmd.product_id.clone();
        let quantity = cmd.quantity;
        let raw_materials = cmd.raw_materials.clone();

        self.handler
            .execute(&cmd.tenant_id, production_id, |order| {
                order.schedule(production_id, product_id, quantity, raw_materials)
            })
            .await
    }

    /// Starts a scheduled run.
    #[tracing::instrument(skip(self, cmd), fields(production = %cmd.production_id, tenant = %cmd.tenant_id))]
    pub async fn start_production(
        &self,
        cmd: StartProduction,
    ) -> Result<CommandResult<ProductionOrder>, DomainError> {
        self.handler
            .execute(&cmd.tenant_id, cmd.production_id, |order| order.start())
            .await
    }

    /// Completes a running production.
    #[tracing::instrument(skip(self, cmd), fields(production = %cmd.production_id, tenant = %cmd.tenant_id))]
    pub async fn complete_production(
        &self,
        cmd: CompleteProduction,
    ) -> Result<CommandResult<ProductionOrder>, DomainError> {
        self.handler
            .execute(&cmd.tenant_id, cmd.production_id, |order| order.complete())
            .await
    }

    /// Loads a production order by ID.
    pub async fn get_production_order(
        &self,
        tenant_id: &TenantId,
        production_id: AggregateId,
    ) -> Result<Option<ProductionOrder>, DomainError> {
        self.handler.load_existing(tenant_id, production_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manufacturing::{ProductionState, RawMaterial};
    use common::ProductId;
    use event_store::InMemoryEventStore;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    #[tokio::test]
    async fn schedule_start_complete() {
        let service = ManufacturingService::new(InMemoryEventStore::detached());

        let cmd = ScheduleProduction::new(
            tenant(),
            "SKU-FG",
            5,
            vec![RawMaterial {
                product_id: ProductId::new("SKU-RM"),
                quantity: 10,
            }],
        );
        let production_id = cmd.production_id;
        service.schedule_production(cmd).await.unwrap();

        service
            .start_production(StartProduction::new(tenant(), production_id))
            .await
            .unwrap();

        let result = service
            .complete_production(CompleteProduction::new(tenant(), production_id))
            .await
            .unwrap();
        assert_eq!(result.aggregate.state(), ProductionState::Completed);

        let order = service
            .get_production_order(&tenant(), production_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.state(), ProductionState::Completed);
    }

    #[tokio::test]
    async fn complete_without_start_fails() {
        let service = ManufacturingService::new(InMemoryEventStore::detached());

        let cmd = ScheduleProduction::new(tenant(), "SKU-FG", 5, vec![]);
        let production_id = cmd.production_id;
        service.schedule_production(cmd).await.unwrap();

        let result = service
            .complete_production(CompleteProduction::new(tenant(), production_id))
            .await;
        assert!(result.is_err());
    }
}
