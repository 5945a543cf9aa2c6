//! Full-platform integration tests: commands in, views and follow-up
//! workflows out.

use std::future::Future;
use std::time::Duration;

use common::{ProductId, TenantId};
use domain::{
    CompleteProduction, CustomerId, InitializeOrder, Money, OrderItem, OrderState, RawMaterial,
    ReceiveStock, ScheduleProduction, ShipPackage, ShippingAddress, StartProduction,
};
use platform::{Platform, PlatformConfig};
use stock::{AllocationRequest, StockError};

fn tenant() -> TenantId {
    TenantId::new("acme")
}

fn address() -> ShippingAddress {
    ShippingAddress::new("1 Main St", "Springfield", "12345", "US")
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn order_flows_through_to_shipment_and_views() {
    let platform = Platform::start(PlatformConfig::default());

    platform
        .inventory()
        .receive_stock(ReceiveStock::new(tenant(), "SKU-001", "L1", "B1", 10))
        .await
        .unwrap();

    let cmd = InitializeOrder::new(
        tenant(),
        CustomerId::new(),
        vec![OrderItem::new("SKU-001", "Widget", 4, Money::from_cents(1000))],
        address(),
    );
    let order_id = cmd.order_id;
    platform.orders().initialize_order(cmd).await.unwrap();

    // Saga confirms, shipment saga creates, projectors catch up.
    wait_for(|| async {
        matches!(
            platform.order_view().get(&tenant(), order_id).await,
            Some(doc) if doc.status == OrderState::Confirmed
        )
    })
    .await;

    wait_for(|| async {
        platform
            .shipment_view()
            .get_for_order(&tenant(), order_id)
            .await
            .is_some()
    })
    .await;

    let order_doc = platform.order_view().get(&tenant(), order_id).await.unwrap();
    assert_eq!(order_doc.total_cents, 4000);
    assert_eq!(order_doc.items.len(), 1);

    wait_for(|| async {
        matches!(
            platform.stock_view().get(&tenant(), &ProductId::new("SKU-001")).await,
            Some(doc) if doc.reserved_quantity == 4
        )
    })
    .await;

    assert!(platform.dead_letters().is_empty());
    platform.shutdown().await;
}

#[tokio::test]
async fn insufficient_stock_rejects_the_order() {
    let platform = Platform::start(PlatformConfig::default());

    let cmd = InitializeOrder::new(
        tenant(),
        CustomerId::new(),
        vec![OrderItem::new("SKU-NONE", "Ghost", 10, Money::from_cents(100))],
        address(),
    );
    let order_id = cmd.order_id;
    platform.orders().initialize_order(cmd).await.unwrap();

    wait_for(|| async {
        matches!(
            platform.order_view().get(&tenant(), order_id).await,
            Some(doc) if doc.status == OrderState::Rejected
        )
    })
    .await;

    let doc = platform.order_view().get(&tenant(), order_id).await.unwrap();
    assert_eq!(doc.rejection_reason.as_deref(), Some("Insufficient Stock"));

    assert!(
        platform
            .shipment_view()
            .get_for_order(&tenant(), order_id)
            .await
            .is_none()
    );

    platform.shutdown().await;
}

#[tokio::test]
async fn manufacturing_completion_restocks_inventory() {
    let platform = Platform::start(PlatformConfig::default());

    platform
        .inventory()
        .receive_stock(ReceiveStock::new(tenant(), "SKU-RM", "L1", "B1", 20))
        .await
        .unwrap();

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
    platform.manufacturing().schedule_production(cmd).await.unwrap();
    platform
        .manufacturing()
        .start_production(StartProduction::new(tenant(), production_id))
        .await
        .unwrap();
    platform
        .manufacturing()
        .complete_production(CompleteProduction::new(tenant(), production_id))
        .await
        .unwrap();

    wait_for(|| async {
        matches!(
            platform.stock_view().get(&tenant(), &ProductId::new("SKU-FG")).await,
            Some(doc) if doc.total_quantity == 5
        )
    })
    .await;

    let raw = platform
        .stock_view()
        .get(&tenant(), &ProductId::new("SKU-RM"))
        .await
        .unwrap();
    assert_eq!(raw.reserved_quantity, 10);

    platform.shutdown().await;
}

#[tokio::test]
async fn views_can_be_rebuilt_from_the_log() {
    let platform = Platform::start(PlatformConfig::default());

    platform
        .inventory()
        .receive_stock(ReceiveStock::new(tenant(), "SKU-R", "L1", "B1", 7))
        .await
        .unwrap();

    let cmd = InitializeOrder::new(
        tenant(),
        CustomerId::new(),
        vec![OrderItem::new("SKU-R", "Widget", 2, Money::from_cents(500))],
        address(),
    );
    let order_id = cmd.order_id;
    platform.orders().initialize_order(cmd).await.unwrap();

    wait_for(|| async {
        matches!(
            platform.order_view().get(&tenant(), order_id).await,
            Some(doc) if doc.status == OrderState::Confirmed
        )
    })
    .await;

    let before = platform.order_view().get(&tenant(), order_id).await.unwrap();

    let replayed = platform.rebuild_views().await.unwrap();
    assert!(replayed >= 4);

    let after = platform.order_view().get(&tenant(), order_id).await.unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(after.total_cents, before.total_cents);
    assert_eq!(after.items.len(), before.items.len());

    let stock = platform
        .stock_view()
        .get(&tenant(), &ProductId::new("SKU-R"))
        .await
        .unwrap();
    assert_eq!(stock.total_quantity, 7);
    assert_eq!(stock.reserved_quantity, 2);

    platform.shutdown().await;
}

#[tokio::test]
async fn shipping_the_package_updates_the_view() {
    let platform = Platform::start(PlatformConfig::default());

    platform
        .inventory()
        .receive_stock(ReceiveStock::new(tenant(), "SKU-S", "L1", "B1", 10))
        .await
        .unwrap();

    let cmd = InitializeOrder::new(
        tenant(),
        CustomerId::new(),
        vec![OrderItem::new("SKU-S", "Widget", 2, Money::from_cents(500))],
        address(),
    );
    let order_id = cmd.order_id;
    platform.orders().initialize_order(cmd).await.unwrap();

    wait_for(|| async {
        platform
            .shipment_view()
            .get_for_order(&tenant(), order_id)
            .await
            .is_some()
    })
    .await;

    platform
        .shipments()
        .ship_package(ShipPackage::new(tenant(), order_id, "TRACK-42"))
        .await
        .unwrap();

    wait_for(|| async {
        matches!(
            platform.shipment_view().get_for_order(&tenant(), order_id).await,
            Some(doc) if doc.tracking_number.as_deref() == Some("TRACK-42")
        )
    })
    .await;

    platform.shutdown().await;
}

#[tokio::test]
async fn allocator_handles_direct_reservations() {
    let platform = Platform::start(PlatformConfig::default());
    let allocator = platform.allocator();

    allocator
        .receive(
            &tenant(),
            &ProductId::new("SKU-D"),
            &common::LocationId::new("L1"),
            &common::BatchId::new("B1"),
            10,
            "PO-1",
        )
        .await
        .unwrap();

    allocator
        .allocate(&tenant(), &[AllocationRequest::new("SKU-D", 6)], "ORDER-1")
        .await
        .unwrap();

    let result = allocator
        .allocate(&tenant(), &[AllocationRequest::new("SKU-D", 6)], "ORDER-2")
        .await;
    assert!(matches!(result, Err(StockError::InsufficientStock { .. })));

    let shipped = allocator.commit(&tenant(), "ORDER-1").await.unwrap();
    assert_eq!(shipped, 6);

    platform.shutdown().await;
}

#[tokio::test]
async fn tenants_are_isolated_end_to_end() {
    let platform = Platform::start(PlatformConfig::default());
    let acme = TenantId::new("acme");
    let globex = TenantId::new("globex");

    platform
        .inventory()
        .receive_stock(ReceiveStock::new(acme.clone(), "SKU-T", "L1", "B1", 10))
        .await
        .unwrap();

    // Globex sells the same product but holds no stock: its order must
    // be rejected even though acme has plenty.
    let cmd = InitializeOrder::new(
        globex.clone(),
        CustomerId::new(),
        vec![OrderItem::new("SKU-T", "Widget", 2, Money::from_cents(500))],
        address(),
    );
    let order_id = cmd.order_id;
    platform.orders().initialize_order(cmd).await.unwrap();

    wait_for(|| async {
        matches!(
            platform.order_view().get(&globex, order_id).await,
            Some(doc) if doc.status == OrderState::Rejected
        )
    })
    .await;

    assert!(platform.order_view().get(&acme, order_id).await.is_none());

    wait_for(|| async {
        matches!(
            platform.stock_view().get(&acme, &ProductId::new("SKU-T")).await,
            Some(doc) if doc.total_quantity == 10 && doc.reserved_quantity == 0
        )
    })
    .await;

    platform.shutdown().await;
}
