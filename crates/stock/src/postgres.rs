//! PostgreSQL-backed stock store.

use async_trait::async_trait;
use common::{BatchId, LocationId, ProductId, TenantId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::entry::{MovementType, StockEntry, StockMovement};
use crate::error::{Result, StockError};
use crate::store::{EntryWrite, StockStore, VersionedEntry};

/// Stock store over the `stock_entries` and `stock_movements` tables.
///
/// Revisions are checked with conditional UPDATEs inside one
/// transaction; a zero-row update means another writer moved the entry
/// and the whole batch rolls back as a `Conflict`.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_entry(row: PgRow) -> Result<VersionedEntry> {
        Ok(VersionedEntry {
            entry: StockEntry {
                product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
                location_id: LocationId::new(row.try_get::<String, _>("location_id")?),
                batch_id: BatchId::new(row.try_get::<String, _>("batch_id")?),
                quantity: row.try_get::<i64, _>("quantity")? as u64,
                reserved_quantity: row.try_get::<i64, _>("reserved_quantity")? as u64,
            },
            revision: row.try_get::<i64, _>("revision")? as u64,
        })
    }

    fn row_to_movement(row: PgRow) -> Result<StockMovement> {
        let movement_type: String = row.try_get("movement_type")?;
        let movement_type = movement_type
            .parse::<MovementType>()
            .map_err(StockError::Storage)?;

        Ok(StockMovement {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            location_id: LocationId::new(row.try_get::<String, _>("location_id")?),
            batch_id: BatchId::new(row.try_get::<String, _>("batch_id")?),
            quantity: row.try_get::<i64, _>("quantity")? as u64,
            movement_type,
            reference_id: row.try_get("reference_id")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn load_product_entries(
        &self,
        tenant_id: &TenantId,
        product_ids: &[ProductId],
    ) -> Result<Vec<VersionedEntry>> {
        let products: Vec<String> = product_ids
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            r#"
            SELECT product_id, location_id, batch_id, quantity, reserved_quantity, revision
            FROM stock_entries
            WHERE tenant_id = $1 AND product_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(&products)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn load_reference_movements(
        &self,
        tenant_id: &TenantId,
        reference_id: &str,
    ) -> Result<Vec<StockMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, location_id, batch_id, quantity, movement_type, reference_id, timestamp
            FROM stock_movements
            WHERE tenant_id = $1 AND reference_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Self::row_to_movement).collect()
    }

    async fn commit_writes(
        &self,
        tenant_id: &TenantId,
        writes: Vec<EntryWrite>,
        movements: Vec<StockMovement>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for write in &writes {
            let entry = &write.entry;
            match write.expected_revision {
                None => {
                    let inserted = sqlx::query(
                        r#"
                        INSERT INTO stock_entries
                            (tenant_id, product_id, location_id, batch_id, quantity, reserved_quantity, revision)
                        VALUES ($1, $2, $3, $4, $5, $6, 1)
                        ON CONFLICT (tenant_id, product_id, location_id, batch_id) DO NOTHING
                        "#,
                    )
                    .bind(tenant_id.as_str())
                    .bind(entry.product_id.as_str())
                    .bind(entry.location_id.as_str())
                    .bind(entry.batch_id.as_str())
                    .bind(entry.quantity as i64)
                    .bind(entry.reserved_quantity as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;

                    if inserted.rows_affected() == 0 {
                        return Err(StockError::Conflict);
                    }
                }
                Some(expected) => {
                    let updated = sqlx::query(
                        r#"
                        UPDATE stock_entries
                        SET quantity = $5, reserved_quantity = $6, revision = revision + 1
                        WHERE tenant_id = $1 AND product_id = $2 AND location_id = $3
                          AND batch_id = $4 AND revision = $7
                        "#,
                    )
                    .bind(tenant_id.as_str())
                    .bind(entry.product_id.as_str())
                    .bind(entry.location_id.as_str())
                    .bind(entry.batch_id.as_str())
                    .bind(entry.quantity as i64)
                    .bind(entry.reserved_quantity as i64)
                    .bind(expected as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;

                    if updated.rows_affected() == 0 {
                        return Err(StockError::Conflict);
                    }
                }
            }
        }

        for movement in &movements {
            sqlx::query(
                r#"
                INSERT INTO stock_movements
                    (tenant_id, product_id, location_id, batch_id, quantity, movement_type, reference_id, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(tenant_id.as_str())
            .bind(movement.product_id.as_str())
            .bind(movement.location_id.as_str())
            .bind(movement.batch_id.as_str())
            .bind(movement.quantity as i64)
            .bind(movement.movement_type.as_str())
            .bind(&movement.reference_id)
            .bind(movement.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}

fn db_error(error: sqlx::Error) -> StockError {
    StockError::Storage(error.to_string())
}
