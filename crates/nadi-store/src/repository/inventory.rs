//! # Inventory Repository
//!
//! Stock counters and the delta ledger behind them.
//!
//! ## Delta Ledger
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Stock Update Strategy                           │
//! │                                                                     │
//! │  ❌ WRONG: absolute writes (clobber concurrent sales on sync)       │
//! │     UPDATE inventory_cache SET stock = 7 WHERE product_id = ?       │
//! │                                                                     │
//! │  ✅ RIGHT: clamped delta + ledger row, one transaction              │
//! │     stock' = MAX(0, stock + delta)                                  │
//! │     INSERT INTO inventory_deltas (.., delta = stock' - stock, ..)   │
//! │                                                                     │
//! │  Terminal A sells 3, terminal B sells 2: the deltas merge to -5     │
//! │  on the remote counter without either device overwriting the       │
//! │  other. Pending deltas are also replayed on top of any pulled       │
//! │  remote baseline.                                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger records the *effective* delta (post-clamp), so a replay can
//! never subtract stock that was never actually removed.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::StoreResult;
use crate::repository::new_row_id;
use nadi_core::{InventoryCount, ProductWithStock, StockDelta};

/// Applies a clamped stock delta on an open connection and records the
/// effective movement in the ledger.
///
/// Shared by [`InventoryRepository::adjust_stock`] (its own transaction)
/// and the sale writer (inside the checkout transaction). Returns the new
/// stock value.
pub(crate) async fn apply_delta_on(
    conn: &mut SqliteConnection,
    product_id: &str,
    requested: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> StoreResult<i64> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM inventory_cache WHERE product_id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    let current = current.unwrap_or(0);
    // Saturating subtraction: an oversell clamps at zero instead of
    // corrupting the counter or failing the sale.
    let new_stock = (current + requested).max(0);
    let effective = new_stock - current;

    sqlx::query(
        r#"
        INSERT INTO inventory_cache (product_id, stock, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (product_id) DO UPDATE SET
            stock = excluded.stock,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(product_id)
    .bind(new_stock)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if effective != 0 {
        sqlx::query(
            r#"
            INSERT INTO inventory_deltas (id, product_id, delta, reason, created_at, sync_status)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending')
            "#,
        )
        .bind(new_row_id())
        .bind(product_id)
        .bind(effective)
        .bind(reason)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        product_id = %product_id,
        requested,
        effective,
        new_stock,
        "Applied stock delta"
    );

    Ok(new_stock)
}

/// Repository for inventory counters and the delta ledger.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Adjusts stock by a delta, clamped at zero.
    ///
    /// `new_stock = max(0, current + delta)` -- an oversell saturates
    /// rather than erroring. Counter update and ledger row commit
    /// together. Returns the new stock.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        delta: i64,
        reason: &str,
    ) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        let new_stock = apply_delta_on(&mut *tx, product_id, delta, reason, Utc::now()).await?;
        tx.commit().await?;
        Ok(new_stock)
    }

    /// Sets stock to an absolute value (manual stocktake edit).
    ///
    /// Internally still a delta, so the movement lands in the ledger.
    pub async fn set_stock(&self, product_id: &str, stock: i64) -> StoreResult<i64> {
        let target = stock.max(0);
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM inventory_cache WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let delta = target - current.unwrap_or(0);

        let new_stock =
            apply_delta_on(&mut *tx, product_id, delta, "adjustment", Utc::now()).await?;
        tx.commit().await?;
        Ok(new_stock)
    }

    /// The raw counter row for a product, if one exists.
    pub async fn count(&self, product_id: &str) -> StoreResult<Option<InventoryCount>> {
        let count = sqlx::query_as::<_, InventoryCount>(
            "SELECT product_id, stock, updated_at FROM inventory_cache WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    /// Current stock for a product; a missing row reads as 0.
    pub async fn stock_of(&self, product_id: &str) -> StoreResult<i64> {
        Ok(self.count(product_id).await?.map_or(0, |c| c.stock))
    }

    /// Active products at or below the threshold, lowest stock first.
    pub async fn low_stock(&self, threshold: i64) -> StoreResult<Vec<ProductWithStock>> {
        let products = sqlx::query_as::<_, ProductWithStock>(
            r#"
            SELECT
                p.id, p.name, p.price, p.is_active,
                COALESCE(i.stock, 0) AS stock,
                p.updated_at, p.sync_status
            FROM products p
            LEFT JOIN inventory_cache i ON p.id = i.product_id
            WHERE p.is_active = 1 AND COALESCE(i.stock, 0) <= ?1
            ORDER BY stock ASC, p.name ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    // =========================================================================
    // Sync bookkeeping
    // =========================================================================

    /// Sum of the deltas not yet accepted by the remote store for one
    /// product. This is the amount replayed on top of a pulled baseline.
    pub async fn pending_delta_sum(&self, product_id: &str) -> StoreResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(delta) FROM inventory_deltas
            WHERE product_id = ?1 AND sync_status = 'pending'
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    /// Ledger rows waiting to be pushed, in creation order.
    pub async fn pending_deltas(&self, limit: u32) -> StoreResult<Vec<StockDelta>> {
        let deltas = sqlx::query_as::<_, StockDelta>(
            r#"
            SELECT id, product_id, delta, reason, created_at, sync_status
            FROM inventory_deltas
            WHERE sync_status = 'pending'
            ORDER BY id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(deltas)
    }

    /// Marks a ledger row as accepted by the remote store.
    pub async fn mark_delta_synced(&self, id: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE inventory_deltas SET sync_status = 'synced', sync_attempts = 0 WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a push rejection for a ledger row; flips to `failed` once
    /// the retry budget is spent.
    pub async fn record_delta_push_rejection(
        &self,
        id: &str,
        max_attempts: u32,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE inventory_deltas SET
                sync_attempts = sync_attempts + 1,
                sync_status = CASE
                    WHEN sync_attempts + 1 >= ?2 THEN 'failed'
                    ELSE sync_status
                END
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(max_attempts as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
