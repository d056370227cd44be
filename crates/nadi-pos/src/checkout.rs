//! # Checkout
//!
//! Converts a priced cart into a permanent sales record, atomically and
//! fully offline.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        commit_sale(method)                          │
//! │                                                                     │
//! │  1. read cart lines (frozen prices)                                 │
//! │  2. subtotal = Σ qty·price;  total = subtotal - discount + tax      │
//! │  3. generate order id (UUIDv7, caller-visible for crash retry)      │
//! │  4. TransactionRepository::commit_sale                              │
//! │        header + items + payment + stock decrements, ONE transaction │
//! │  5. only after commit: clear the cart                               │
//! │                                                                     │
//! │  DuplicateCommit (same id retried after a crash) is success:        │
//! │  nothing is written twice, the cart is cleared, the stored order    │
//! │  is returned.                                                       │
//! │                                                                     │
//! │  Any other failure: no partial rows remain and the cart is left     │
//! │  intact so the cashier can retry.                                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no user-facing cancel once the atomic block starts; up to
//! that point every cart mutation is independently retriable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cart::CartAggregate;
use crate::error::PosResult;
use nadi_core::{
    CoreError, Money, PaymentAttempt, PaymentMethod, PaymentStatus, SaleTransaction, SyncStatus,
    TransactionItem,
};
use nadi_store::{new_row_id, Store, StoreError};

/// One sold line in an order view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    /// Product name at commit time, for receipts and history screens.
    pub name: String,
    pub qty: i64,
    /// Unit price frozen from the cart line.
    pub price: Money,
}

/// A committed order, the shape history and receipt screens consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub date: DateTime<Utc>,
}

/// The order/transaction writer.
#[derive(Debug, Clone)]
pub struct Checkout {
    store: Store,
}

impl Checkout {
    /// Creates a checkout writer over the given store.
    pub fn new(store: Store) -> Self {
        Checkout { store }
    }

    /// Commits the current cart as a sale paid with `method`.
    ///
    /// Discount and tax are zero today; populated values flow through
    /// unchanged via [`commit_sale_adjusted`](Self::commit_sale_adjusted).
    pub async fn commit_sale(
        &self,
        cart: &CartAggregate,
        method: PaymentMethod,
    ) -> PosResult<Order> {
        self.commit_sale_adjusted(cart, method, Money::zero(), Money::zero())
            .await
    }

    /// Commits the current cart with explicit discount and tax amounts.
    ///
    /// `total = subtotal - discount + tax` holds on the stored header by
    /// construction.
    pub async fn commit_sale_adjusted(
        &self,
        cart: &CartAggregate,
        method: PaymentMethod,
        discount: Money,
        tax: Money,
    ) -> PosResult<Order> {
        self.commit_sale_with_id(cart, method, discount, tax, new_row_id())
            .await
    }

    /// Commits the current cart under a caller-supplied order id.
    ///
    /// This is the crash-recovery entry point: a checkout interrupted
    /// before confirmation can be retried with the id it already
    /// generated, and the retry is a no-op success instead of a second
    /// sale.
    pub async fn commit_sale_with_id(
        &self,
        cart: &CartAggregate,
        method: PaymentMethod,
        discount: Money,
        tax: Money,
        order_id: String,
    ) -> PosResult<Order> {
        let view = cart.view().await?;
        if view.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let subtotal: Money = view.lines.iter().map(|l| l.line_total()).sum();
        let sale = SaleTransaction::new(order_id.clone(), subtotal, discount, tax, Utc::now());

        let items: Vec<TransactionItem> = view
            .lines
            .iter()
            .map(|line| TransactionItem {
                id: new_row_id(),
                transaction_id: order_id.clone(),
                product_id: line.product_id.clone(),
                qty: line.qty,
                price: line.price,
                sync_status: SyncStatus::Pending,
            })
            .collect();

        let payment = PaymentAttempt {
            id: new_row_id(),
            transaction_id: order_id.clone(),
            method,
            status: PaymentStatus::Success,
            provider_ref: None,
            sync_status: SyncStatus::Pending,
        };

        match self
            .store
            .transactions()
            .commit_sale(&sale, &items, &payment)
            .await
        {
            Ok(()) => {}
            // A crash-and-retry landed on an id that already committed.
            // The first commit is the sale; report success with the
            // stored rows, not the ones this call built.
            Err(StoreError::DuplicateCommit { transaction_id }) => {
                warn!(id = %transaction_id, "Duplicate sale commit treated as success");
                cart.clear().await?;
                return match self.order(&transaction_id).await? {
                    Some(order) => Ok(order),
                    None => Err(StoreError::not_found("Transaction", &transaction_id).into()),
                };
            }
            Err(e) => return Err(e.into()),
        }

        // The cart is cleared only once the sale is durably committed.
        cart.clear().await?;

        let order = self.order_view(&sale, &items, method).await?;
        info!(id = %order.id, total = %order.total_amount, "Checkout complete");
        Ok(order)
    }

    /// Loads a committed order back into its view shape.
    pub async fn order(&self, order_id: &str) -> PosResult<Option<Order>> {
        let Some(sale) = self.store.transactions().get(order_id).await? else {
            return Ok(None);
        };

        let items = self.store.transactions().items(order_id).await?;
        let payments = self.store.transactions().payments(order_id).await?;
        let method = payments
            .iter()
            .find(|p| p.status == PaymentStatus::Success)
            .or_else(|| payments.first())
            .map(|p| p.method)
            .unwrap_or(PaymentMethod::Cash);

        Ok(Some(self.order_view(&sale, &items, method).await?))
    }

    async fn order_view(
        &self,
        sale: &SaleTransaction,
        items: &[TransactionItem],
        method: PaymentMethod,
    ) -> PosResult<Order> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            // Retired products still resolve here; a missing row falls
            // back to the raw id so history rendering never fails.
            let name = self
                .store
                .products()
                .get(&item.product_id)
                .await?
                .map(|p| p.name)
                .unwrap_or_else(|| item.product_id.clone());

            lines.push(OrderLine {
                product_id: item.product_id.clone(),
                name,
                qty: item.qty,
                price: item.price,
            });
        }

        Ok(Order {
            id: sale.id.clone(),
            lines,
            total_amount: sale.total,
            payment_method: method,
            date: sale.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use nadi_store::StoreConfig;

    async fn fixture() -> (Store, CartAggregate, Checkout, String) {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();
        let cart = CartAggregate::new(store.clone());
        let checkout = Checkout::new(store.clone());
        (store, cart, checkout, product.id)
    }

    #[tokio::test]
    async fn test_kopi_scenario_end_to_end() {
        // Add product "Kopi" price 18000 stock 10, add 2 to cart,
        // checkout with Cash: one order of 36000, stock 8, cart empty.
        let (store, cart, checkout, product_id) = fixture().await;

        cart.add_item(&product_id, 2).await.unwrap();

        let order = checkout.commit_sale(&cart, PaymentMethod::Cash).await.unwrap();
        assert_eq!(order.total_amount, Money::from_minor(36_000));
        assert_eq!(order.payment_method, PaymentMethod::Cash);
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].name, "Kopi");
        assert_eq!(order.lines[0].qty, 2);

        assert_eq!(store.inventory().stock_of(&product_id).await.unwrap(), 8);
        assert!(cart.view().await.unwrap().is_empty());

        let stored = store.transactions().get(&order.id).await.unwrap().unwrap();
        assert!(stored.total_is_consistent());
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_checkout() {
        let (_store, cart, checkout, _product_id) = fixture().await;

        let err = checkout
            .commit_sale(&cart, PaymentMethod::Qris)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Core(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_price_edit_after_add_does_not_change_committed_price() {
        let (store, cart, checkout, product_id) = fixture().await;

        cart.add_item(&product_id, 1).await.unwrap();
        store
            .products()
            .update_info(&product_id, None, Some(Money::from_minor(25_000)))
            .await
            .unwrap();

        let order = checkout.commit_sale(&cart, PaymentMethod::Cash).await.unwrap();
        assert_eq!(order.lines[0].price, Money::from_minor(18_000));
        assert_eq!(order.total_amount, Money::from_minor(18_000));
    }

    #[tokio::test]
    async fn test_discount_and_tax_are_honored() {
        let (_store, cart, checkout, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        let order = checkout
            .commit_sale_adjusted(
                &cart,
                PaymentMethod::Debit,
                Money::from_minor(5_000),
                Money::from_minor(1_000),
            )
            .await
            .unwrap();

        // 36000 - 5000 + 1000
        assert_eq!(order.total_amount, Money::from_minor(32_000));
    }

    #[tokio::test]
    async fn test_crash_retry_with_same_order_id_yields_one_sale() {
        let (store, cart, checkout, product_id) = fixture().await;
        let order_id = new_row_id();

        cart.add_item(&product_id, 2).await.unwrap();
        let first = checkout
            .commit_sale_with_id(
                &cart,
                PaymentMethod::Cash,
                Money::zero(),
                Money::zero(),
                order_id.clone(),
            )
            .await
            .unwrap();

        // Retry after a "crash": the cart was repopulated, but the order
        // id is the one already committed.
        cart.add_item(&product_id, 2).await.unwrap();
        let second = checkout
            .commit_sale_with_id(
                &cart,
                PaymentMethod::Cash,
                Money::zero(),
                Money::zero(),
                order_id.clone(),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.total_amount, Money::from_minor(36_000));
        // One item set, one stock decrement, and the retry cleared the cart.
        assert_eq!(store.transactions().items(&order_id).await.unwrap().len(), 1);
        assert_eq!(store.inventory().stock_of(&product_id).await.unwrap(), 8);
        assert!(cart.view().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_serializes_for_ipc() {
        let (_store, cart, checkout, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        let order = checkout.commit_sale(&cart, PaymentMethod::Cash).await.unwrap();
        let json: serde_json::Value = serde_json::to_value(&order).unwrap();

        assert_eq!(json["totalAmount"], 36_000);
        assert_eq!(json["paymentMethod"], "cash");
        assert_eq!(json["lines"][0]["name"], "Kopi");
        assert_eq!(json["lines"][0]["qty"], 2);
    }

    #[tokio::test]
    async fn test_order_roundtrips_from_storage() {
        let (_store, cart, checkout, product_id) = fixture().await;
        cart.add_item(&product_id, 2).await.unwrap();

        let order = checkout.commit_sale(&cart, PaymentMethod::Qris).await.unwrap();
        let loaded = checkout.order(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
        assert!(checkout.order("missing").await.unwrap().is_none());
    }
}
