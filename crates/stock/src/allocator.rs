//! The stock allocation engine.

use std::collections::HashMap;
use std::time::Duration;

use common::{BatchId, LocationId, ProductId, TenantId};
use rand::Rng;

use crate::entry::{MovementType, StockEntry, StockMovement};
use crate::error::{Result, StockError};
use crate::store::{EntryWrite, StockStore, VersionedEntry};

/// One line of an allocation batch.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub product_id: ProductId,
    pub quantity: u64,
}

impl AllocationRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A finished-good bucket created by a production run.
#[derive(Debug, Clone)]
pub struct ProducedStock {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub batch_id: BatchId,
    pub quantity: u64,
}

/// Retry policy for the read-compute-write cycle.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Attempts before giving up with `Timeout`.
    pub max_attempts: u32,

    /// Base delay; actual backoff is scaled by the attempt number plus
    /// random jitter.
    pub base_backoff: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
        }
    }
}

type BucketKey = (ProductId, LocationId, BatchId);

/// Atomic multi-item, multi-bucket stock reservation engine.
///
/// Every operation runs the same cycle: load the involved entries,
/// compute the new bucket states, and commit them conditionally on the
/// revisions they were read at. A lost race is retried from fresh state
/// up to the configured bound; shortage aborts the whole batch before
/// anything is written.
///
/// Buckets are drained largest-available-first.
pub struct StockAllocator<S: StockStore> {
    store: S,
    config: AllocatorConfig,
}

impl<S: StockStore> StockAllocator<S> {
    /// Creates an allocator with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_config(store, AllocatorConfig::default())
    }

    /// Creates an allocator with an explicit retry policy.
    pub fn with_config(store: S, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    /// Reserves stock for every request in the batch, all or nothing.
    ///
    /// Returns the `Allocation` movements written. Shortage on any line
    /// fails the whole batch with `InsufficientStock` before any write;
    /// contention is retried internally and surfaces as `Timeout` once
    /// the attempts are exhausted.
    #[tracing::instrument(skip(self, requests), fields(reference = %reference_id, tenant = %tenant_id))]
    pub async fn allocate(
        &self,
        tenant_id: &TenantId,
        requests: &[AllocationRequest],
        reference_id: &str,
    ) -> Result<Vec<StockMovement>> {
        // Duplicate products in one batch are folded into a single line.
        let mut requested: HashMap<ProductId, u64> = HashMap::new();
        for request in requests {
            *requested.entry(request.product_id.clone()).or_default() += request.quantity;
        }
        let products: Vec<ProductId> = requested.keys().cloned().collect();

        for attempt in 1..=self.config.max_attempts {
            let entries = self.store.load_product_entries(tenant_id, &products).await?;
            let mut by_product = group_by_product(entries);

            let mut writes = Vec::new();
            let mut movements = Vec::new();

            for (product_id, quantity) in &requested {
                let mut buckets = by_product.remove(product_id).unwrap_or_default();
                buckets.sort_by(|a, b| b.entry.available().cmp(&a.entry.available()));

                let available: u64 = buckets.iter().map(|v| v.entry.available()).sum();
                if available < *quantity {
                    return Err(StockError::InsufficientStock {
                        product_id: product_id.to_string(),
                        requested: *quantity,
                        available,
                    });
                }

                let mut remaining = *quantity;
                for versioned in buckets {
                    if remaining == 0 {
                        break;
                    }
                    let take = versioned.entry.available().min(remaining);
                    if take == 0 {
                        continue;
                    }
                    let mut entry = versioned.entry;
                    entry.reserved_quantity += take;
                    movements.push(StockMovement::new(
                        &entry,
                        take,
                        MovementType::Allocation,
                        reference_id,
                    ));
                    writes.push(EntryWrite {
                        entry,
                        expected_revision: Some(versioned.revision),
                    });
                    remaining -= take;
                }
            }

            match self
                .store
                .commit_writes(tenant_id, writes, movements.clone())
                .await
            {
                Ok(()) => {
                    metrics::counter!("stock_allocations").increment(1);
                    return Ok(movements);
                }
                Err(StockError::Conflict) => {
                    tracing::debug!(attempt, "allocation lost optimistic race, retrying");
                    self.backoff(attempt).await;
                }
                Err(other) => return Err(other),
            }
        }

        metrics::counter!("stock_allocation_timeouts").increment(1);
        Err(StockError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    /// Finalizes a reference's allocations: quantity and reservation
    /// both drop, recorded as `Outbound` movements.
    ///
    /// Idempotent per reference; a second commit finds no outstanding
    /// allocation and changes nothing. Returns the units shipped.
    #[tracing::instrument(skip(self), fields(reference = %reference_id, tenant = %tenant_id))]
    pub async fn commit(&self, tenant_id: &TenantId, reference_id: &str) -> Result<u64> {
        self.settle(
            tenant_id,
            reference_id,
            MovementType::Outbound,
            |entry, net| {
                entry.quantity -= net;
                entry.reserved_quantity -= net;
            },
        )
        .await
    }

    /// Releases a reference's allocations back to availability,
    /// recorded as `Release` movements. Returns the units released.
    #[tracing::instrument(skip(self), fields(reference = %reference_id, tenant = %tenant_id))]
    pub async fn release(&self, tenant_id: &TenantId, reference_id: &str) -> Result<u64> {
        self.settle(
            tenant_id,
            reference_id,
            MovementType::Release,
            |entry, net| {
                entry.reserved_quantity -= net;
            },
        )
        .await
    }

    /// Receives stock into a bucket, recorded as an `Inbound` movement.
    #[tracing::instrument(skip(self), fields(product = %product_id, tenant = %tenant_id))]
    pub async fn receive(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
        location_id: &LocationId,
        batch_id: &BatchId,
        quantity: u64,
        reference_id: &str,
    ) -> Result<()> {
        for attempt in 1..=self.config.max_attempts {
            let entries = self
                .store
                .load_product_entries(tenant_id, std::slice::from_ref(product_id))
                .await?;

            let existing = entries.into_iter().find(|v| {
                v.entry.location_id == *location_id && v.entry.batch_id == *batch_id
            });

            let (mut entry, expected_revision) = match existing {
                Some(versioned) => (versioned.entry, Some(versioned.revision)),
                None => (
                    StockEntry::new(
                        product_id.clone(),
                        location_id.clone(),
                        batch_id.clone(),
                    ),
                    None,
                ),
            };
            entry.quantity += quantity;

            let movement =
                StockMovement::new(&entry, quantity, MovementType::Inbound, reference_id);

            match self
                .store
                .commit_writes(
                    tenant_id,
                    vec![EntryWrite {
                        entry,
                        expected_revision,
                    }],
                    vec![movement],
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(StockError::Conflict) => self.backoff(attempt).await,
                Err(other) => return Err(other),
            }
        }

        Err(StockError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    /// Moves available stock of one batch between locations.
    #[tracing::instrument(skip(self), fields(product = %product_id, tenant = %tenant_id))]
    pub async fn transfer(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
        batch_id: &BatchId,
        from: &LocationId,
        to: &LocationId,
        quantity: u64,
        reference_id: &str,
    ) -> Result<()> {
        for attempt in 1..=self.config.max_attempts {
            let entries = self
                .store
                .load_product_entries(tenant_id, std::slice::from_ref(product_id))
                .await?;

            let source = entries
                .iter()
                .find(|v| v.entry.location_id == *from && v.entry.batch_id == *batch_id)
                .cloned();

            let Some(source) = source else {
                return Err(StockError::InsufficientStock {
                    product_id: product_id.to_string(),
                    requested: quantity,
                    available: 0,
                });
            };

            if source.entry.available() < quantity {
                return Err(StockError::InsufficientStock {
                    product_id: product_id.to_string(),
                    requested: quantity,
                    available: source.entry.available(),
                });
            }

            let destination = entries
                .iter()
                .find(|v| v.entry.location_id == *to && v.entry.batch_id == *batch_id)
                .cloned();

            let mut source_entry = source.entry;
            source_entry.quantity -= quantity;

            let (mut dest_entry, dest_revision) = match destination {
                Some(versioned) => (versioned.entry, Some(versioned.revision)),
                None => (
                    StockEntry::new(product_id.clone(), to.clone(), batch_id.clone()),
                    None,
                ),
            };
            dest_entry.quantity += quantity;

            let movements = vec![
                StockMovement::new(
                    &source_entry,
                    quantity,
                    MovementType::TransferOut,
                    reference_id,
                ),
                StockMovement::new(
                    &dest_entry,
                    quantity,
                    MovementType::TransferIn,
                    reference_id,
                ),
            ];

            match self
                .store
                .commit_writes(
                    tenant_id,
                    vec![
                        EntryWrite {
                            entry: source_entry,
                            expected_revision: Some(source.revision),
                        },
                        EntryWrite {
                            entry: dest_entry,
                            expected_revision: dest_revision,
                        },
                    ],
                    movements,
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(StockError::Conflict) => self.backoff(attempt).await,
                Err(other) => return Err(other),
            }
        }

        Err(StockError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    /// Consumes raw-material buckets and creates finished goods in one
    /// transaction, aborting entirely when any raw material is short.
    #[tracing::instrument(skip(self, consume, produce), fields(reference = %reference_id, tenant = %tenant_id))]
    pub async fn execute_production(
        &self,
        tenant_id: &TenantId,
        consume: &[AllocationRequest],
        produce: &[ProducedStock],
        reference_id: &str,
    ) -> Result<()> {
        let mut products: Vec<ProductId> =
            consume.iter().map(|r| r.product_id.clone()).collect();
        products.extend(produce.iter().map(|p| p.product_id.clone()));
        products.sort();
        products.dedup();

        for attempt in 1..=self.config.max_attempts {
            let entries = self.store.load_product_entries(tenant_id, &products).await?;
            let mut by_product = group_by_product(entries.clone());

            // Buckets may be touched by both sides, so the pending
            // writes are keyed and merged.
            let mut pending: HashMap<BucketKey, EntryWrite> = HashMap::new();
            let mut movements = Vec::new();

            for request in consume {
                let mut buckets = by_product.remove(&request.product_id).unwrap_or_default();
                buckets.sort_by(|a, b| b.entry.available().cmp(&a.entry.available()));

                let available: u64 = buckets.iter().map(|v| v.entry.available()).sum();
                if available < request.quantity {
                    return Err(StockError::InsufficientStock {
                        product_id: request.product_id.to_string(),
                        requested: request.quantity,
                        available,
                    });
                }

                let mut remaining = request.quantity;
                for versioned in buckets {
                    if remaining == 0 {
                        break;
                    }
                    let take = versioned.entry.available().min(remaining);
                    if take == 0 {
                        continue;
                    }
                    let mut entry = versioned.entry;
                    entry.quantity -= take;
                    movements.push(StockMovement::new(
                        &entry,
                        take,
                        MovementType::ProductionOut,
                        reference_id,
                    ));
                    pending.insert(
                        bucket_key(&entry),
                        EntryWrite {
                            entry,
                            expected_revision: Some(versioned.revision),
                        },
                    );
                    remaining -= take;
                }
            }

            for produced in produce {
                let key = (
                    produced.product_id.clone(),
                    produced.location_id.clone(),
                    produced.batch_id.clone(),
                );

                let write = match pending.remove(&key) {
                    Some(mut write) => {
                        write.entry.quantity += produced.quantity;
                        write
                    }
                    None => {
                        let existing = entries.iter().find(|v| bucket_key(&v.entry) == key);
                        let (mut entry, expected_revision) = match existing {
                            Some(versioned) => {
                                (versioned.entry.clone(), Some(versioned.revision))
                            }
                            None => (
                                StockEntry::new(
                                    produced.product_id.clone(),
                                    produced.location_id.clone(),
                                    produced.batch_id.clone(),
                                ),
                                None,
                            ),
                        };
                        entry.quantity += produced.quantity;
                        EntryWrite {
                            entry,
                            expected_revision,
                        }
                    }
                };

                movements.push(StockMovement::new(
                    &write.entry,
                    produced.quantity,
                    MovementType::ProductionIn,
                    reference_id,
                ));
                pending.insert(key, write);
            }

            match self
                .store
                .commit_writes(tenant_id, pending.into_values().collect(), movements)
                .await
            {
                Ok(()) => {
                    metrics::counter!("stock_productions").increment(1);
                    return Ok(());
                }
                Err(StockError::Conflict) => self.backoff(attempt).await,
                Err(other) => return Err(other),
            }
        }

        Err(StockError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    /// Shared settle cycle for commit/release: applies the reference's
    /// outstanding allocation per bucket and records the given movement
    /// type.
    async fn settle<F>(
        &self,
        tenant_id: &TenantId,
        reference_id: &str,
        movement_type: MovementType,
        apply: F,
    ) -> Result<u64>
    where
        F: Fn(&mut StockEntry, u64),
    {
        for attempt in 1..=self.config.max_attempts {
            let history = self
                .store
                .load_reference_movements(tenant_id, reference_id)
                .await?;

            if !history
                .iter()
                .any(|m| m.movement_type == MovementType::Allocation)
            {
                return Err(StockError::UnknownReference {
                    reference_id: reference_id.to_string(),
                });
            }

            let outstanding = outstanding_allocations(&history);
            if outstanding.is_empty() {
                // Already settled; nothing left to apply.
                return Ok(0);
            }

            let products: Vec<ProductId> = outstanding
                .keys()
                .map(|(product, _, _)| product.clone())
                .collect();
            let entries = self.store.load_product_entries(tenant_id, &products).await?;

            let mut writes = Vec::new();
            let mut movements = Vec::new();
            let mut total = 0;

            for versioned in entries {
                let Some(net) = outstanding.get(&bucket_key(&versioned.entry)) else {
                    continue;
                };
                let mut entry = versioned.entry;
                apply(&mut entry, *net);
                movements.push(StockMovement::new(
                    &entry,
                    *net,
                    movement_type,
                    reference_id,
                ));
                writes.push(EntryWrite {
                    entry,
                    expected_revision: Some(versioned.revision),
                });
                total += *net;
            }

            match self.store.commit_writes(tenant_id, writes, movements).await {
                Ok(()) => return Ok(total),
                Err(StockError::Conflict) => self.backoff(attempt).await,
                Err(other) => return Err(other),
            }
        }

        Err(StockError::Timeout {
            attempts: self.config.max_attempts,
        })
    }

    /// Sleeps for an attempt-scaled, jittered delay before retrying.
    async fn backoff(&self, attempt: u32) {
        let base = self.config.base_backoff.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=base.max(1));
        let delay = Duration::from_millis(base * attempt as u64 + jitter);
        tokio::time::sleep(delay).await;
    }
}

fn bucket_key(entry: &StockEntry) -> BucketKey {
    (
        entry.product_id.clone(),
        entry.location_id.clone(),
        entry.batch_id.clone(),
    )
}

fn group_by_product(
    entries: Vec<VersionedEntry>,
) -> HashMap<ProductId, Vec<VersionedEntry>> {
    let mut by_product: HashMap<ProductId, Vec<VersionedEntry>> = HashMap::new();
    for versioned in entries {
        by_product
            .entry(versioned.entry.product_id.clone())
            .or_default()
            .push(versioned);
    }
    by_product
}

/// Per-bucket allocation still outstanding for a reference:
/// allocations minus what was already shipped or released.
fn outstanding_allocations(history: &[StockMovement]) -> HashMap<BucketKey, u64> {
    let mut net: HashMap<BucketKey, i64> = HashMap::new();
    for movement in history {
        let key = (
            movement.product_id.clone(),
            movement.location_id.clone(),
            movement.batch_id.clone(),
        );
        match movement.movement_type {
            MovementType::Allocation => *net.entry(key).or_default() += movement.quantity as i64,
            MovementType::Outbound | MovementType::Release => {
                *net.entry(key).or_default() -= movement.quantity as i64
            }
            _ => {}
        }
    }

    net.into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(key, n)| (key, n as u64))
        .collect()
}
