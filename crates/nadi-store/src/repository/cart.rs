//! # Cart Repository
//!
//! Durable rows behind the draft cart: `cart_draft` headers and
//! `cart_items` lines.
//!
//! The model permits several draft rows, but only one is "active": the
//! most recently created, with the id as a deterministic tie-break
//! (UUIDv7 ids make that stable even for equal timestamps). A draft row
//! is reused across sales; checkout clears its lines, not the header.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::repository::new_row_id;
use nadi_core::{CartDraft, CartLine};

/// Repository for cart draft and line operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Returns the active draft, if any: newest `created_at`, ties broken
    /// by id descending.
    pub async fn active_cart(&self) -> StoreResult<Option<CartDraft>> {
        let draft = sqlx::query_as::<_, CartDraft>(
            r#"
            SELECT id, created_at FROM cart_draft
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(draft)
    }

    /// Returns the active draft, creating one if none exists.
    pub async fn get_or_create_active(&self) -> StoreResult<CartDraft> {
        if let Some(draft) = self.active_cart().await? {
            return Ok(draft);
        }

        let draft = CartDraft {
            id: new_row_id(),
            created_at: Utc::now(),
        };

        debug!(id = %draft.id, "Creating cart draft");

        sqlx::query("INSERT INTO cart_draft (id, created_at) VALUES (?1, ?2)")
            .bind(&draft.id)
            .bind(draft.created_at)
            .execute(&self.pool)
            .await?;

        Ok(draft)
    }

    /// Adds a product to the cart.
    ///
    /// An existing line for the product bumps its quantity in place; a new
    /// line freezes the product's *current* price. Later price edits do
    /// not touch lines already in the cart.
    pub async fn add_item(&self, cart_id: &str, product_id: &str, qty: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Freeze the price as of now. Retired products cannot be added.
        let price: Option<i64> =
            sqlx::query_scalar("SELECT price FROM products WHERE id = ?1 AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;

        let price = price.ok_or_else(|| StoreError::not_found("Product", product_id))?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, qty, price)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                qty = cart_items.qty + excluded.qty
            "#,
        )
        .bind(new_row_id())
        .bind(cart_id)
        .bind(product_id)
        .bind(qty)
        .bind(price)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Sets the quantity of a line. `qty <= 0` removes the line.
    pub async fn set_qty(&self, cart_id: &str, product_id: &str, qty: i64) -> StoreResult<()> {
        if qty <= 0 {
            return self.remove_line(cart_id, product_id).await;
        }

        let result =
            sqlx::query("UPDATE cart_items SET qty = ?3 WHERE cart_id = ?1 AND product_id = ?2")
                .bind(cart_id)
                .bind(product_id)
                .bind(qty)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Cart line", product_id));
        }

        Ok(())
    }

    /// Removes a line from the cart.
    pub async fn remove_line(&self, cart_id: &str, product_id: &str) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1 AND product_id = ?2")
                .bind(cart_id)
                .bind(product_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Cart line", product_id));
        }

        Ok(())
    }

    /// Deletes every line of the cart; the draft row itself is kept for
    /// the next sale.
    pub async fn clear(&self, cart_id: &str) -> StoreResult<()> {
        debug!(cart_id = %cart_id, "Clearing cart");

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Lines of a cart in the order they were first added.
    pub async fn lines(&self, cart_id: &str) -> StoreResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, cart_id, product_id, qty, price
            FROM cart_items
            WHERE cart_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Store, StoreConfig};
    use nadi_core::Money;

    async fn store_with_product() -> (Store, String) {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();
        (store, product.id)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_active_draft() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let carts = store.carts();

        let first = carts.get_or_create_active().await.unwrap();
        let second = carts.get_or_create_active().await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_add_item_bumps_existing_line() {
        let (store, product_id) = store_with_product().await;
        let carts = store.carts();
        let cart = carts.get_or_create_active().await.unwrap();

        carts.add_item(&cart.id, &product_id, 1).await.unwrap();
        carts.add_item(&cart.id, &product_id, 2).await.unwrap();

        let lines = carts.lines(&cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].qty, 3);
        assert_eq!(lines[0].price, Money::from_minor(18_000));
    }

    #[tokio::test]
    async fn test_line_price_is_frozen_at_add_time() {
        let (store, product_id) = store_with_product().await;
        let carts = store.carts();
        let cart = carts.get_or_create_active().await.unwrap();

        carts.add_item(&cart.id, &product_id, 1).await.unwrap();

        // Price edit after the line exists.
        store
            .products()
            .update_info(&product_id, None, Some(Money::from_minor(25_000)))
            .await
            .unwrap();

        let lines = carts.lines(&cart.id).await.unwrap();
        assert_eq!(lines[0].price, Money::from_minor(18_000));
    }

    #[tokio::test]
    async fn test_set_qty_zero_removes_line() {
        let (store, product_id) = store_with_product().await;
        let carts = store.carts();
        let cart = carts.get_or_create_active().await.unwrap();

        carts.add_item(&cart.id, &product_id, 2).await.unwrap();
        carts.set_qty(&cart.id, &product_id, 0).await.unwrap();

        assert!(carts.lines(&cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_product_fails() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let carts = store.carts();
        let cart = carts.get_or_create_active().await.unwrap();

        let err = carts.add_item(&cart.id, "no-such-id", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_clear_keeps_draft_row() {
        let (store, product_id) = store_with_product().await;
        let carts = store.carts();
        let cart = carts.get_or_create_active().await.unwrap();

        carts.add_item(&cart.id, &product_id, 2).await.unwrap();
        carts.clear(&cart.id).await.unwrap();

        assert!(carts.lines(&cart.id).await.unwrap().is_empty());
        let active = carts.active_cart().await.unwrap().unwrap();
        assert_eq!(active.id, cart.id);
    }
}
