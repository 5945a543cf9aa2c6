//! Inventory commands.

use common::{AggregateId, BatchId, LocationId, ProductId, TenantId};

use crate::command::Command;

use super::{ProductStock, stock_stream_id};

/// Command to receive stock into a `(location, batch)` bucket.
#[derive(Debug, Clone)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
}

impl ReceiveStock {
    pub fn new(
        tenant_id: TenantId,
        product_id: impl Into<ProductId>,
        location_id: impl Into<LocationId>,
        batch_id: impl Into<BatchId>,
        quantity: u64,
    ) -> Self {
        Self {
            tenant_id,
            product_id: product_id.into(),
            location_id: location_id.into(),
            batch_id: batch_id.into(),
            quantity,
        }
    }
}

impl Command for ReceiveStock {
    type Aggregate = ProductStock;

    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    fn aggregate_id(&self) -> AggregateId {
        stock_stream_id(&self.product_id)
    }
}

/// Command to reserve stock for an order.
#[derive(Debug, Clone)]
pub struct ReserveStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub order_id: AggregateId,
    pub quantity: u64,
    /// When true, a shortage reserves whatever is available instead of
    /// recording an allocation failure.
    pub allow_partial: bool,
}

impl ReserveStock {
    pub fn new(
        tenant_id: TenantId,
        product_id: impl Into<ProductId>,
        order_id: AggregateId,
        quantity: u64,
    ) -> Self {
        Self {
            tenant_id,
            product_id: product_id.into(),
            order_id,
            quantity,
            allow_partial: false,
        }
    }

    /// Allows a partial fill on shortage.
    pub fn allow_partial(mut self) -> Self {
        self.allow_partial = true;
        self
    }
}

impl Command for ReserveStock {
    type Aggregate = ProductStock;

    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    fn aggregate_id(&self) -> AggregateId {
        stock_stream_id(&self.product_id)
    }
}

/// Command to release an order's reservation.
#[derive(Debug, Clone)]
pub struct ReleaseStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub order_id: AggregateId,
}

impl ReleaseStock {
    pub fn new(
        tenant_id: TenantId,
        product_id: impl Into<ProductId>,
        order_id: AggregateId,
    ) -> Self {
        Self {
            tenant_id,
            product_id: product_id.into(),
            order_id,
        }
    }
}

impl Command for ReleaseStock {
    type Aggregate = ProductStock;

    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    fn aggregate_id(&self) -> AggregateId {
        stock_stream_id(&self.product_id)
    }
}

/// Command to finalize an order's reservation.
#[derive(Debug, Clone)]
pub struct ShipStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub order_id: AggregateId,
}

impl ShipStock {
    pub fn new(
        tenant_id: TenantId,
        product_id: impl Into<ProductId>,
        order_id: AggregateId,
    ) -> Self {
        Self {
            tenant_id,
            product_id: product_id.into(),
            order_id,
        }
    }
}

impl Command for ShipStock {
    type Aggregate = ProductStock;

    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    fn aggregate_id(&self) -> AggregateId {
        stock_stream_id(&self.product_id)
    }
}
