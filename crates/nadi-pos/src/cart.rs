//! # Cart Aggregate
//!
//! The "current cart" concept on top of the durable cart rows, with an
//! in-memory mirror for low-latency reads.
//!
//! ## Write-Through Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     apply_and_project(op)                           │
//! │                                                                     │
//! │  UI action (add / set qty / remove / clear)                         │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  1. durable write through CartRepository                            │
//! │       │                                                             │
//! │       ├── Ok  → 2. re-read lines → replace projection → return it   │
//! │       │                                                             │
//! │       └── Err → 2. re-read lines → replace projection → propagate   │
//! │                                                                     │
//! │  The projection is updated only AFTER the store write succeeds      │
//! │  (write-through, not write-back), so the UI never shows state       │
//! │  that failed to persist. On failure the projection is re-read       │
//! │  from the store: no optimistic state survives a failed operation.   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::PosResult;
use nadi_core::validation::validate_quantity;
use nadi_core::{CartLine, Money};
use nadi_store::{CartRepository, Store, StoreResult};

/// Immutable snapshot of the active cart, served from memory.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CartView {
    pub cart_id: String,
    pub lines: Vec<CartLine>,
}

impl CartView {
    /// Total quantity across all lines.
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.qty).sum()
    }

    /// Sum of line totals at their frozen prices.
    pub fn total_price(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Serializes the "current cart" concept for one device.
///
/// Constructed once with an explicit [`Store`] (no hidden globals) and
/// shared behind whatever the caller prefers; all interior state is
/// behind an async lock.
#[derive(Debug)]
pub struct CartAggregate {
    store: Store,
    view: RwLock<Option<CartView>>,
}

impl CartAggregate {
    /// Creates an aggregate over the given store.
    pub fn new(store: Store) -> Self {
        CartAggregate {
            store,
            view: RwLock::new(None),
        }
    }

    /// Returns the active cart id, creating a draft if none exists.
    ///
    /// Most-recently-created draft wins, with a deterministic id
    /// tie-break.
    pub async fn get_or_create_active_cart(&self) -> PosResult<String> {
        let view = self.current_view().await?;
        Ok(view.cart_id)
    }

    /// Adds `qty` of a product to the active cart.
    ///
    /// An existing line bumps its quantity in place; a new line captures
    /// the product's current price.
    pub async fn add_item(&self, product_id: &str, qty: i64) -> PosResult<CartView> {
        validate_quantity(qty)?;

        let product_id = product_id.to_string();
        self.apply_and_project(move |repo, cart_id| async move {
            repo.add_item(&cart_id, &product_id, qty).await
        })
        .await
    }

    /// Sets the quantity of a line; `qty <= 0` removes it.
    pub async fn set_quantity(&self, product_id: &str, qty: i64) -> PosResult<CartView> {
        if qty > 0 {
            validate_quantity(qty)?;
        }

        let target = product_id.to_string();
        self.apply_and_project(move |repo, cart_id| async move {
            repo.set_qty(&cart_id, &target, qty).await
        })
        .await
        .map_err(|e| line_not_found_to_domain(e, product_id))
    }

    /// Removes a line from the active cart.
    pub async fn remove_item(&self, product_id: &str) -> PosResult<CartView> {
        let target = product_id.to_string();
        self.apply_and_project(move |repo, cart_id| async move {
            repo.remove_line(&cart_id, &target).await
        })
        .await
        .map_err(|e| line_not_found_to_domain(e, product_id))
    }

    /// Clears all lines; the draft row is reused for the next sale.
    pub async fn clear(&self) -> PosResult<CartView> {
        self.apply_and_project(|repo, cart_id| async move { repo.clear(&cart_id).await })
            .await
    }

    /// Current projection; loads it from the store on first use.
    pub async fn view(&self) -> PosResult<CartView> {
        self.current_view().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// The single mutation path: durable write, then projection refresh.
    ///
    /// The refresh happens on both outcomes -- after success it reflects
    /// the new durable state, after failure it reverts any stale
    /// optimism by re-reading what actually persisted.
    async fn apply_and_project<F, Fut>(&self, op: F) -> PosResult<CartView>
    where
        F: FnOnce(CartRepository, String) -> Fut,
        Fut: std::future::Future<Output = StoreResult<()>>,
    {
        let cart_id = self.current_view().await?.cart_id;

        let result = op(self.store.carts(), cart_id.clone()).await;

        let refreshed = self.load_view(&cart_id).await?;
        *self.view.write().await = Some(refreshed.clone());

        match result {
            Ok(()) => Ok(refreshed),
            Err(e) => {
                debug!(cart_id = %cart_id, error = %e, "Cart write failed, projection reverted");
                Err(e.into())
            }
        }
    }

    async fn current_view(&self) -> PosResult<CartView> {
        if let Some(view) = self.view.read().await.clone() {
            return Ok(view);
        }

        let draft = self.store.carts().get_or_create_active().await?;
        let view = self.load_view(&draft.id).await?;
        *self.view.write().await = Some(view.clone());
        Ok(view)
    }

    async fn load_view(&self, cart_id: &str) -> PosResult<CartView> {
        let lines = self.store.carts().lines(cart_id).await?;
        Ok(CartView {
            cart_id: cart_id.to_string(),
            lines,
        })
    }
}

/// Maps a missing cart line onto the domain error the UI actually wants.
fn line_not_found_to_domain(err: crate::error::PosError, product_id: &str) -> crate::error::PosError {
    use crate::error::PosError;
    use nadi_core::CoreError;
    use nadi_store::StoreError;

    match err {
        PosError::Store(StoreError::NotFound { .. }) => {
            PosError::Core(CoreError::NotInCart(product_id.to_string()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use nadi_core::CoreError;
    use nadi_store::{StoreConfig, StoreError};

    async fn fixture() -> (Store, CartAggregate, String) {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();
        let cart = CartAggregate::new(store.clone());
        (store, cart, product.id)
    }

    #[tokio::test]
    async fn test_add_item_projects_after_write() {
        let (_store, cart, product_id) = fixture().await;

        let view = cart.add_item(&product_id, 2).await.unwrap();
        assert_eq!(view.total_items(), 2);
        assert_eq!(view.total_price(), Money::from_minor(36_000));

        let view = cart.add_item(&product_id, 1).await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.total_items(), 3);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_projection_on_durable_state() {
        let (_store, cart, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        let err = cart.add_item("ghost-product", 1).await.unwrap_err();
        assert!(matches!(err, PosError::Store(StoreError::NotFound { .. })));

        // Projection still matches what is durable: one line, qty 2.
        let view = cart.view().await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.total_items(), 2);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let (_store, cart, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        let view = cart.set_quantity(&product_id, 0).await.unwrap();
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_quantity_rejected_before_any_write() {
        let (_store, cart, product_id) = fixture().await;

        let err = cart.add_item(&product_id, 0).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::Validation(_))));
        let err = cart.add_item(&product_id, 1_000).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::Validation(_))));

        assert!(cart.view().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removing_absent_line_is_a_domain_error() {
        let (_store, cart, product_id) = fixture().await;

        let err = cart.remove_item(&product_id).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::NotInCart(_))));
        let err = cart.set_quantity(&product_id, 3).await.unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::NotInCart(_))));
    }

    #[tokio::test]
    async fn test_projection_survives_across_aggregate_instances() {
        let (store, cart, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        // A fresh aggregate over the same store picks up the same draft.
        let second = CartAggregate::new(store);
        let view = second.view().await.unwrap();
        assert_eq!(view.total_items(), 2);
    }
}
