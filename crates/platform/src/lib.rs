//! Composition root for the event-sourced operations core.
//!
//! Assembles the single-process reference deployment: the in-memory
//! event store and work queue, one command service per bounded
//! context, the read-view projectors, the process managers, and the
//! outbox relay. Everything is constructed exactly once here and
//! shared by reference; no component registers handlers anywhere else.

pub mod config;
pub mod telemetry;

use std::sync::Arc;

use domain::{InventoryService, ManufacturingService, OrderService, ShipmentService};
use event_store::{
    EventBus, InMemoryEventStore, InMemoryWorkQueue, OutboxRelay, QueuedMessage,
};
use projections::{
    OrderView, Projection, ProjectionSubscriber, ReplayService, ShipmentView, StockView,
};
use saga::{IdempotencyStore, ManufacturingSaga, OrderSaga, ShipmentSaga};
use stock::{InMemoryStockStore, StockAllocator};
use tokio::task::JoinHandle;

pub use config::PlatformConfig;
pub use telemetry::init_tracing;

/// The assembled platform.
///
/// Command services and read views are the surface outer layers (HTTP
/// handlers, schedulers) call into; the relay runs in the background
/// from construction until [`Platform::shutdown`].
pub struct Platform {
    store: InMemoryEventStore,
    queue: Arc<InMemoryWorkQueue>,

    orders: Arc<OrderService<InMemoryEventStore>>,
    inventory: Arc<InventoryService<InMemoryEventStore>>,
    manufacturing: Arc<ManufacturingService<InMemoryEventStore>>,
    shipments: Arc<ShipmentService<InMemoryEventStore>>,

    order_view: Arc<OrderView>,
    stock_view: Arc<StockView>,
    shipment_view: Arc<ShipmentView>,

    allocator: Arc<StockAllocator<Arc<InMemoryStockStore>>>,

    relay_handle: JoinHandle<()>,
}

impl Platform {
    /// Builds and starts the platform.
    pub fn start(config: PlatformConfig) -> Self {
        let queue = Arc::new(InMemoryWorkQueue::new(config.max_deliveries));
        let store = InMemoryEventStore::new(Arc::clone(&queue));

        let orders = Arc::new(OrderService::new(store.clone()));
        let inventory = Arc::new(InventoryService::new(store.clone()));
        let manufacturing = Arc::new(ManufacturingService::new(store.clone()));
        let shipments = Arc::new(ShipmentService::new(store.clone()));

        let order_view = Arc::new(OrderView::new());
        let stock_view = Arc::new(StockView::new());
        let shipment_view = Arc::new(ShipmentView::new());

        let markers = Arc::new(IdempotencyStore::new(config.marker_ttl));

        let order_saga = Arc::new(OrderSaga::new(
            Arc::clone(&orders),
            Arc::clone(&inventory),
            Arc::clone(&markers),
        ));
        let manufacturing_saga = Arc::new(ManufacturingSaga::new(
            Arc::clone(&inventory),
            Arc::clone(&markers),
            config.finished_goods_location.clone(),
        ));
        let shipment_saga = Arc::new(ShipmentSaga::new(
            Arc::clone(&shipments),
            Arc::clone(&order_view),
            Arc::clone(&markers),
        ));

        // Projectors subscribe ahead of the sagas so any saga reading
        // a view sees the document written for the triggering event.
        let mut builder = EventBus::builder();
        for projection in [
            Arc::clone(&order_view) as Arc<dyn Projection>,
            Arc::clone(&stock_view) as Arc<dyn Projection>,
            Arc::clone(&shipment_view) as Arc<dyn Projection>,
        ] {
            let subscriber = ProjectionSubscriber::new(Arc::clone(&projection));
            for event_type in projection.interests() {
                builder = builder.subscribe(*event_type, subscriber.clone());
            }
        }
        let bus = builder
            .subscribe("OrderInitialized", order_saga)
            .subscribe("ProductionCompleted", manufacturing_saga)
            .subscribe("OrderConfirmed", shipment_saga)
            .build();

        let relay_handle =
            OutboxRelay::new(Arc::clone(&queue), Arc::new(bus)).spawn();

        let allocator = Arc::new(StockAllocator::with_config(
            Arc::new(InMemoryStockStore::new()),
            config.allocator.clone(),
        ));

        tracing::info!("platform started");

        Self {
            store,
            queue,
            orders,
            inventory,
            manufacturing,
            shipments,
            order_view,
            stock_view,
            shipment_view,
            allocator,
            relay_handle,
        }
    }

    /// The shared event store.
    pub fn store(&self) -> &InMemoryEventStore {
        &self.store
    }

    /// Orders command service.
    pub fn orders(&self) -> &Arc<OrderService<InMemoryEventStore>> {
        &self.orders
    }

    /// Inventory command service.
    pub fn inventory(&self) -> &Arc<InventoryService<InMemoryEventStore>> {
        &self.inventory
    }

    /// Manufacturing command service.
    pub fn manufacturing(&self) -> &Arc<ManufacturingService<InMemoryEventStore>> {
        &self.manufacturing
    }

    /// Shipments command service.
    pub fn shipments(&self) -> &Arc<ShipmentService<InMemoryEventStore>> {
        &self.shipments
    }

    /// Order read view.
    pub fn order_view(&self) -> &Arc<OrderView> {
        &self.order_view
    }

    /// Stock read view.
    pub fn stock_view(&self) -> &Arc<StockView> {
        &self.stock_view
    }

    /// Shipment read view.
    pub fn shipment_view(&self) -> &Arc<ShipmentView> {
        &self.shipment_view
    }

    /// Direct-call stock allocation engine.
    pub fn allocator(&self) -> &Arc<StockAllocator<Arc<InMemoryStockStore>>> {
        &self.allocator
    }

    /// Queued events that exhausted their delivery attempts.
    pub fn dead_letters(&self) -> Vec<QueuedMessage> {
        self.queue.dead_letters()
    }

    /// Rebuilds all read views from the event log.
    pub async fn rebuild_views(&self) -> projections::Result<u64> {
        let projections: Vec<Arc<dyn Projection>> = vec![
            Arc::clone(&self.order_view) as Arc<dyn Projection>,
            Arc::clone(&self.stock_view) as Arc<dyn Projection>,
            Arc::clone(&self.shipment_view) as Arc<dyn Projection>,
        ];
        ReplayService::new(self.store.clone())
            .rebuild(&projections)
            .await
    }

    /// Closes the queue and waits for the relay to drain.
    pub async fn shutdown(self) {
        self.queue.close();
        if let Err(error) = self.relay_handle.await {
            tracing::error!(%error, "relay task failed during shutdown");
        }
        tracing::info!("platform stopped");
    }
}
