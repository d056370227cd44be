//! # Transaction Repository
//!
//! The permanent sales record and its atomic writer.
//!
//! ## The Commit Unit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  commit_sale: ONE TRANSACTION                       │
//! │                                                                     │
//! │   1. idempotence check: id already committed? → DuplicateCommit     │
//! │   2. INSERT transactions_local        (header, totals)              │
//! │   3. INSERT transaction_items_local   (one per sold line)           │
//! │   4. stock decrement + delta ledger   (one per sold line)           │
//! │   5. INSERT payment_attempts_local    (status = success)            │
//! │                                                                     │
//! │   COMMIT ← all of it or none of it                                  │
//! │                                                                     │
//! │  The stock decrement lives INSIDE this transaction: a sale must     │
//! │  never commit against inventory it did not actually consume, and a  │
//! │  failed insert must leave the counters untouched.                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Committed rows are immutable except for the `sync_status`/`server_id`
//! bookkeeping columns.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::repository::inventory::apply_delta_on;
use nadi_core::{PaymentAttempt, SaleTransaction, TransactionItem};

/// Repository for committed sale transactions.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Atomically persists a completed sale: header, frozen line items,
    /// payment attempt, and the per-line stock decrements.
    ///
    /// ## Idempotence
    /// The caller generates the transaction id before calling. Retrying
    /// after a crash with the same id returns
    /// [`StoreError::DuplicateCommit`] without writing anything; callers
    /// treat that as success.
    pub async fn commit_sale(
        &self,
        sale: &SaleTransaction,
        items: &[TransactionItem],
        payment: &PaymentAttempt,
    ) -> StoreResult<()> {
        debug!(id = %sale.id, total = %sale.total, "Committing sale");

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM transactions_local WHERE id = ?1")
                .bind(&sale.id)
                .fetch_optional(&mut *tx)
                .await?;

        if existing.is_some() {
            // Safe retry after a crash-before-confirmation. Rolling back
            // the empty transaction leaves the first commit untouched.
            info!(id = %sale.id, "Sale already committed, skipping");
            return Err(StoreError::DuplicateCommit {
                transaction_id: sale.id.clone(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO transactions_local (
                id, subtotal, tax, discount, total, status,
                created_at, updated_at, sync_status, server_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.subtotal)
        .bind(sale.tax)
        .bind(sale.discount)
        .bind(sale.total)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.sync_status)
        .bind(&sale.server_id)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO transaction_items_local (
                    id, transaction_id, product_id, qty, price, sync_status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.transaction_id)
            .bind(&item.product_id)
            .bind(item.qty)
            .bind(item.price)
            .bind(item.sync_status)
            .execute(&mut *tx)
            .await?;

            apply_delta_on(&mut *tx, &item.product_id, -item.qty, "sale", sale.created_at)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO payment_attempts_local (
                id, transaction_id, method, status, provider_ref, sync_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.transaction_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(&payment.provider_ref)
        .bind(payment.sync_status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %sale.id, total = %sale.total, "Sale committed");
        Ok(())
    }

    /// Gets a transaction header by id.
    pub async fn get(&self, id: &str) -> StoreResult<Option<SaleTransaction>> {
        let sale = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, subtotal, tax, discount, total, status,
                   created_at, updated_at, sync_status, server_id
            FROM transactions_local
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Items of a transaction, in the order they were sold.
    pub async fn items(&self, transaction_id: &str) -> StoreResult<Vec<TransactionItem>> {
        let items = sqlx::query_as::<_, TransactionItem>(
            r#"
            SELECT id, transaction_id, product_id, qty, price, sync_status
            FROM transaction_items_local
            WHERE transaction_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Payment attempts recorded against a transaction.
    pub async fn payments(&self, transaction_id: &str) -> StoreResult<Vec<PaymentAttempt>> {
        let payments = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            SELECT id, transaction_id, method, status, provider_ref, sync_status
            FROM payment_attempts_local
            WHERE transaction_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Most recent transactions first.
    pub async fn list_recent(&self, limit: u32) -> StoreResult<Vec<SaleTransaction>> {
        let sales = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, subtotal, tax, discount, total, status,
                   created_at, updated_at, sync_status, server_id
            FROM transactions_local
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Transactions created inside `[start, end]`, oldest first.
    pub async fn list_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<SaleTransaction>> {
        let sales = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, subtotal, tax, discount, total, status,
                   created_at, updated_at, sync_status, server_id
            FROM transactions_local
            WHERE created_at >= ?1 AND created_at <= ?2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    // =========================================================================
    // Sync bookkeeping
    // =========================================================================

    /// Transactions waiting to be pushed, oldest first.
    pub async fn pending_sync(&self, limit: u32) -> StoreResult<Vec<SaleTransaction>> {
        let sales = sqlx::query_as::<_, SaleTransaction>(
            r#"
            SELECT id, subtotal, tax, discount, total, status,
                   created_at, updated_at, sync_status, server_id
            FROM transactions_local
            WHERE sync_status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Marks a transaction (and the items and payment attempts that ride
    /// with it) as accepted by the remote store.
    pub async fn mark_synced(&self, id: &str, server_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE transactions_local SET
                sync_status = 'synced',
                sync_attempts = 0,
                server_id = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(server_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE transaction_items_local SET sync_status = 'synced' WHERE transaction_id = ?1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE payment_attempts_local SET sync_status = 'synced' WHERE transaction_id = ?1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Records a push rejection; flips to `failed` once the retry budget
    /// is spent.
    pub async fn record_push_rejection(&self, id: &str, max_attempts: u32) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE transactions_local SET
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
    use crate::repository::new_row_id;
    use nadi_core::{Money, PaymentMethod, PaymentStatus, SyncStatus};

    async fn store_with_product(stock: i64) -> (Store, String) {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), stock)
            .await
            .unwrap();
        (store, product.id)
    }

    fn sale_parts(
        product_id: &str,
        qty: i64,
        price: Money,
    ) -> (SaleTransaction, Vec<TransactionItem>, PaymentAttempt) {
        let sale = SaleTransaction::new(
            new_row_id(),
            price.times(qty),
            Money::zero(),
            Money::zero(),
            Utc::now(),
        );
        let items = vec![TransactionItem {
            id: new_row_id(),
            transaction_id: sale.id.clone(),
            product_id: product_id.to_string(),
            qty,
            price,
            sync_status: SyncStatus::Pending,
        }];
        let payment = PaymentAttempt {
            id: new_row_id(),
            transaction_id: sale.id.clone(),
            method: PaymentMethod::Cash,
            status: PaymentStatus::Success,
            provider_ref: None,
            sync_status: SyncStatus::Pending,
        };
        (sale, items, payment)
    }

    #[tokio::test]
    async fn test_commit_sale_persists_all_rows_and_decrements_stock() {
        let (store, product_id) = store_with_product(10).await;
        let repo = store.transactions();

        let (sale, items, payment) = sale_parts(&product_id, 2, Money::from_minor(18_000));
        repo.commit_sale(&sale, &items, &payment).await.unwrap();

        let stored = repo.get(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total, Money::from_minor(36_000));
        assert!(stored.total_is_consistent());

        assert_eq!(repo.items(&sale.id).await.unwrap().len(), 1);
        let payments = repo.payments(&sale.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Success);

        assert_eq!(store.inventory().stock_of(&product_id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_commit_sale_is_all_or_nothing() {
        let (store, product_id) = store_with_product(10).await;
        let repo = store.transactions();

        // Second item references a product that does not exist: the
        // foreign key rejects it mid-transaction.
        let (sale, mut items, payment) = sale_parts(&product_id, 2, Money::from_minor(18_000));
        items.push(TransactionItem {
            id: new_row_id(),
            transaction_id: sale.id.clone(),
            product_id: "ghost-product".to_string(),
            qty: 1,
            price: Money::from_minor(1_000),
            sync_status: SyncStatus::Pending,
        });

        let err = repo.commit_sale(&sale, &items, &payment).await.unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));

        // Nothing survived the rollback.
        assert!(repo.get(&sale.id).await.unwrap().is_none());
        assert!(repo.items(&sale.id).await.unwrap().is_empty());
        assert!(repo.payments(&sale.id).await.unwrap().is_empty());
        assert_eq!(store.inventory().stock_of(&product_id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_commit_sale_same_id_is_duplicate_not_double_write() {
        let (store, product_id) = store_with_product(10).await;
        let repo = store.transactions();

        let (sale, items, payment) = sale_parts(&product_id, 2, Money::from_minor(18_000));
        repo.commit_sale(&sale, &items, &payment).await.unwrap();

        // Crash-and-retry with the same generated id.
        let err = repo.commit_sale(&sale, &items, &payment).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCommit { .. }));

        // Exactly one header, one item set, one stock decrement.
        assert_eq!(repo.items(&sale.id).await.unwrap().len(), 1);
        assert_eq!(store.inventory().stock_of(&product_id).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_mark_synced_covers_the_whole_unit() {
        let (store, product_id) = store_with_product(5).await;
        let repo = store.transactions();

        let (sale, items, payment) = sale_parts(&product_id, 1, Money::from_minor(18_000));
        repo.commit_sale(&sale, &items, &payment).await.unwrap();

        repo.mark_synced(&sale.id, "srv-42").await.unwrap();

        let stored = repo.get(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.server_id.as_deref(), Some("srv-42"));
        assert_eq!(
            repo.items(&sale.id).await.unwrap()[0].sync_status,
            SyncStatus::Synced
        );
        assert_eq!(
            repo.payments(&sale.id).await.unwrap()[0].sync_status,
            SyncStatus::Synced
        );
        assert!(repo.pending_sync(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_range_filters_by_created_at() {
        let (store, product_id) = store_with_product(10).await;
        let repo = store.transactions();

        let (sale, items, payment) = sale_parts(&product_id, 1, Money::from_minor(18_000));
        repo.commit_sale(&sale, &items, &payment).await.unwrap();

        let day = chrono::Duration::days(1);
        let hits = repo
            .list_range(sale.created_at - day, sale.created_at + day)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = repo
            .list_range(sale.created_at - day * 3, sale.created_at - day)
            .await
            .unwrap();
        assert!(misses.is_empty());
    }
}
