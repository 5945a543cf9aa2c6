//! Stock entry storage with per-entry optimistic revisions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use common::{BatchId, LocationId, ProductId, TenantId};

use crate::entry::{StockEntry, StockMovement};
use crate::error::{Result, StockError};

/// A stock entry together with the revision token it was read at.
#[derive(Debug, Clone)]
pub struct VersionedEntry {
    pub entry: StockEntry,
    pub revision: u64,
}

/// A conditional write of one stock entry.
#[derive(Debug, Clone)]
pub struct EntryWrite {
    /// The new entry state.
    pub entry: StockEntry,

    /// The revision the entry was read at, or None when the bucket is
    /// expected not to exist yet.
    pub expected_revision: Option<u64>,
}

/// Storage abstraction for stock entries and their audit trail.
///
/// `commit_writes` is the single mutation point: it checks every
/// expected revision before applying anything and appends the
/// movements in the same critical section, failing the whole batch
/// with `Conflict` when any entry moved underneath the caller.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Loads all entries for the given products.
    async fn load_product_entries(
        &self,
        tenant_id: &TenantId,
        product_ids: &[ProductId],
    ) -> Result<Vec<VersionedEntry>>;

    /// Loads all movements recorded against a reference.
    async fn load_reference_movements(
        &self,
        tenant_id: &TenantId,
        reference_id: &str,
    ) -> Result<Vec<StockMovement>>;

    /// Atomically applies a batch of conditional writes plus their
    /// movements. All or nothing.
    async fn commit_writes(
        &self,
        tenant_id: &TenantId,
        writes: Vec<EntryWrite>,
        movements: Vec<StockMovement>,
    ) -> Result<()>;
}

#[async_trait]
impl<T: StockStore + ?Sized> StockStore for std::sync::Arc<T> {
    async fn load_product_entries(
        &self,
        tenant_id: &TenantId,
        product_ids: &[ProductId],
    ) -> Result<Vec<VersionedEntry>> {
        (**self).load_product_entries(tenant_id, product_ids).await
    }

    async fn load_reference_movements(
        &self,
        tenant_id: &TenantId,
        reference_id: &str,
    ) -> Result<Vec<StockMovement>> {
        (**self).load_reference_movements(tenant_id, reference_id).await
    }

    async fn commit_writes(
        &self,
        tenant_id: &TenantId,
        writes: Vec<EntryWrite>,
        movements: Vec<StockMovement>,
    ) -> Result<()> {
        (**self).commit_writes(tenant_id, writes, movements).await
    }
}

type EntryKey = (TenantId, ProductId, LocationId, BatchId);

#[derive(Default)]
struct StoreState {
    entries: HashMap<EntryKey, (StockEntry, u64)>,
    movements: Vec<(TenantId, StockMovement)>,
}

/// In-memory stock store.
#[derive(Default)]
pub struct InMemoryStockStore {
    state: Mutex<StoreState>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of movements recorded, across tenants.
    pub fn movement_count(&self) -> usize {
        self.state.lock().unwrap().movements.len()
    }
}

fn key_of(tenant_id: &TenantId, entry: &StockEntry) -> EntryKey {
    (
        tenant_id.clone(),
        entry.product_id.clone(),
        entry.location_id.clone(),
        entry.batch_id.clone(),
    )
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn load_product_entries(
        &self,
        tenant_id: &TenantId,
        product_ids: &[ProductId],
    ) -> Result<Vec<VersionedEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|((tenant, product, _, _), _)| {
                tenant == tenant_id && product_ids.contains(product)
            })
            .map(|(_, (entry, revision))| VersionedEntry {
                entry: entry.clone(),
                revision: *revision,
            })
            .collect())
    }

    async fn load_reference_movements(
        &self,
        tenant_id: &TenantId,
        reference_id: &str,
    ) -> Result<Vec<StockMovement>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .movements
            .iter()
            .filter(|(tenant, movement)| {
                tenant == tenant_id && movement.reference_id == reference_id
            })
            .map(|(_, movement)| movement.clone())
            .collect())
    }

    async fn commit_writes(
        &self,
        tenant_id: &TenantId,
        writes: Vec<EntryWrite>,
        movements: Vec<StockMovement>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        // Validate every revision before touching anything.
        for write in &writes {
            let key = key_of(tenant_id, &write.entry);
            let current = state.entries.get(&key).map(|(_, revision)| *revision);
            if current != write.expected_revision {
                metrics::counter!("stock_commit_conflicts").increment(1);
                return Err(StockError::Conflict);
            }
        }

        for write in writes {
            let key = key_of(tenant_id, &write.entry);
            let next_revision = write.expected_revision.map(|r| r + 1).unwrap_or(1);
            state.entries.insert(key, (write.entry, next_revision));
        }

        state
            .movements
            .extend(movements.into_iter().map(|m| (tenant_id.clone(), m)));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MovementType;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn entry(quantity: u64) -> StockEntry {
        let mut entry = StockEntry::new("SKU-001", "L1", "B1");
        entry.quantity = quantity;
        entry
    }

    #[tokio::test]
    async fn insert_then_load() {
        let store = InMemoryStockStore::new();
        store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: entry(10),
                    expected_revision: None,
                }],
                vec![],
            )
            .await
            .unwrap();

        let entries = store
            .load_product_entries(&tenant(), &[ProductId::new("SKU-001")])
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.quantity, 10);
        assert_eq!(entries[0].revision, 1);
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let store = InMemoryStockStore::new();
        store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: entry(10),
                    expected_revision: None,
                }],
                vec![],
            )
            .await
            .unwrap();

        // Writing again as if the entry were new loses.
        let result = store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: entry(20),
                    expected_revision: None,
                }],
                vec![],
            )
            .await;
        assert!(matches!(result, Err(StockError::Conflict)));

        // Writing at the read revision wins.
        store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: entry(20),
                    expected_revision: Some(1),
                }],
                vec![],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn conflict_applies_nothing() {
        let store = InMemoryStockStore::new();
        store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: entry(10),
                    expected_revision: None,
                }],
                vec![],
            )
            .await
            .unwrap();

        let mut other = StockEntry::new("SKU-002", "L1", "B1");
        other.quantity = 5;

        // Second write in the batch is stale, so the first must not land.
        let result = store
            .commit_writes(
                &tenant(),
                vec![
                    EntryWrite {
                        entry: other,
                        expected_revision: None,
                    },
                    EntryWrite {
                        entry: entry(99),
                        expected_revision: Some(7),
                    },
                ],
                vec![StockMovement::new(&entry(10), 1, MovementType::Inbound, "R")],
            )
            .await;
        assert!(matches!(result, Err(StockError::Conflict)));

        let entries = store
            .load_product_entries(&tenant(), &[ProductId::new("SKU-002")])
            .await
            .unwrap();
        assert!(entries.is_empty());
        assert_eq!(store.movement_count(), 0);
    }

    #[tokio::test]
    async fn movements_are_scoped_by_reference() {
        let store = InMemoryStockStore::new();
        let e = entry(10);
        store
            .commit_writes(
                &tenant(),
                vec![EntryWrite {
                    entry: e.clone(),
                    expected_revision: None,
                }],
                vec![
                    StockMovement::new(&e, 10, MovementType::Inbound, "PO-1"),
                    StockMovement::new(&e, 4, MovementType::Allocation, "ORDER-1"),
                ],
            )
            .await
            .unwrap();

        let movements = store
            .load_reference_movements(&tenant(), "ORDER-1")
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Allocation);
    }
}
