//! # Product Repository
//!
//! Database operations for products and their stock join.
//!
//! ## Retirement vs Deletion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    remove(product_id)                               │
//! │                                                                     │
//! │  Is the product referenced by any transaction_items_local row?      │
//! │       │                                                             │
//! │       ├── YES → retire: is_active = 0, row kept                     │
//! │       │         (history must keep resolving the product id)        │
//! │       │                                                             │
//! │       └── NO  → hard delete: cart lines, delta ledger, stock row    │
//! │                 and the product go in one transaction               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::repository::new_row_id;
use nadi_core::{Money, Product, ProductWithStock, SyncStatus};

/// What `remove` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Product row deleted outright (nothing referenced it).
    Deleted,
    /// Product retired in place (`is_active = 0`) because sale history
    /// references it.
    Retired,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product together with its stock counter.
    ///
    /// Both rows commit in one transaction; the new rows are stamped
    /// `pending` so the next push cycle picks them up.
    pub async fn insert(
        &self,
        name: &str,
        price: Money,
        initial_stock: i64,
    ) -> StoreResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: new_row_id(),
            name: name.to_string(),
            price,
            is_active: true,
            created_at: now,
            updated_at: now,
            sync_status: SyncStatus::Pending,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, is_active, created_at, updated_at, sync_status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.sync_status)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_cache (product_id, stock, updated_at)
            VALUES (?1, MAX(0, ?2), ?3)
            "#,
        )
        .bind(&product.id)
        .bind(initial_stock)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Gets a product by its id (retired products included).
    pub async fn get(&self, id: &str) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, is_active, created_at, updated_at, sync_status
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product joined with its stock count.
    pub async fn get_with_stock(&self, id: &str) -> StoreResult<Option<ProductWithStock>> {
        let product = sqlx::query_as::<_, ProductWithStock>(
            r#"
            SELECT
                p.id, p.name, p.price, p.is_active,
                COALESCE(i.stock, 0) AS stock,
                p.updated_at, p.sync_status
            FROM products p
            LEFT JOIN inventory_cache i ON p.id = i.product_id
            WHERE p.id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products with their stock, sorted by name.
    ///
    /// A product without a count row reads as stock 0.
    pub async fn list(&self) -> StoreResult<Vec<ProductWithStock>> {
        let products = sqlx::query_as::<_, ProductWithStock>(
            r#"
            SELECT
                p.id, p.name, p.price, p.is_active,
                COALESCE(i.stock, 0) AS stock,
                p.updated_at, p.sync_status
            FROM products p
            LEFT JOIN inventory_cache i ON p.id = i.product_id
            WHERE p.is_active = 1
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates name and/or price. Omitted fields keep their value.
    ///
    /// Stamps `updated_at` and resets the row to `pending` so the edit
    /// gets pushed.
    pub async fn update_info(
        &self,
        id: &str,
        name: Option<&str>,
        price: Option<Money>,
    ) -> StoreResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?2, name),
                price = COALESCE(?3, price),
                updated_at = ?4,
                sync_status = 'pending'
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }

        Ok(())
    }

    /// Removes a product: hard delete when unreferenced, retire when sale
    /// history points at it.
    pub async fn remove(&self, id: &str) -> StoreResult<RemoveOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let referenced: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM transaction_items_local WHERE product_id = ?1 LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if referenced.is_some() {
            debug!(id = %id, "Retiring referenced product");

            let result = sqlx::query(
                r#"
                UPDATE products SET
                    is_active = 0,
                    updated_at = ?2,
                    sync_status = 'pending'
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("Product", id));
            }

            RemoveOutcome::Retired
        } else {
            debug!(id = %id, "Deleting product");

            sqlx::query("DELETE FROM cart_items WHERE product_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM inventory_deltas WHERE product_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM inventory_cache WHERE product_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            let result = sqlx::query("DELETE FROM products WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("Product", id));
            }

            RemoveOutcome::Deleted
        };

        tx.commit().await?;
        Ok(outcome)
    }

    // =========================================================================
    // Sync bookkeeping
    // =========================================================================

    /// Products waiting to be pushed, oldest edits first.
    pub async fn pending_sync(&self, limit: u32) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, is_active, created_at, updated_at, sync_status
            FROM products
            WHERE sync_status = 'pending'
            ORDER BY updated_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Marks a product as accepted by the remote store.
    pub async fn mark_synced(&self, id: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE products SET sync_status = 'synced', sync_attempts = 0 WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a push rejection. The row stays `pending` until the retry
    /// budget is spent, then flips to `failed`.
    pub async fn record_push_rejection(&self, id: &str, max_attempts: u32) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE products SET
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Store, StoreConfig};

    async fn store() -> Store {
        Store::open(StoreConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch_with_stock() {
        let store = store().await;
        let repo = store.products();

        let product = repo
            .insert("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();

        let fetched = repo.get_with_stock(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Kopi");
        assert_eq!(fetched.price, Money::from_minor(18_000));
        assert_eq!(fetched.stock, 10);
        assert_eq!(fetched.sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_info_partial() {
        let store = store().await;
        let repo = store.products();
        let product = repo
            .insert("Teh", Money::from_minor(5_000), 3)
            .await
            .unwrap();

        repo.mark_synced(&product.id).await.unwrap();
        repo.update_info(&product.id, None, Some(Money::from_minor(6_000)))
            .await
            .unwrap();

        let updated = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Teh");
        assert_eq!(updated.price, Money::from_minor(6_000));
        // An edit re-queues the row for push.
        assert_eq!(updated.sync_status, SyncStatus::Pending);
        assert!(updated.updated_at >= product.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_product_is_not_found() {
        let store = store().await;
        let err = store
            .products()
            .update_info("missing-id", Some("X"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_unreferenced_deletes() {
        let store = store().await;
        let repo = store.products();
        let product = repo
            .insert("Roti", Money::from_minor(8_000), 4)
            .await
            .unwrap();

        let outcome = repo.remove(&product.id).await.unwrap();
        assert_eq!(outcome, RemoveOutcome::Deleted);
        assert!(repo.get(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_rejection_flips_to_failed_after_budget() {
        let store = store().await;
        let repo = store.products();
        let product = repo
            .insert("Gula", Money::from_minor(12_000), 7)
            .await
            .unwrap();

        repo.record_push_rejection(&product.id, 2).await.unwrap();
        let p = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(p.sync_status, SyncStatus::Pending);

        repo.record_push_rejection(&product.id, 2).await.unwrap();
        let p = repo.get(&product.id).await.unwrap().unwrap();
        assert_eq!(p.sync_status, SyncStatus::Failed);
    }
}
