//! # Inventory Ledger
//!
//! The product catalog and its stock counters as one service: create and
//! edit products, move stock (always clamped at zero), and derive the
//! low-stock dashboard view.
//!
//! Oversells saturate instead of erroring: a sale that already happened
//! at the counter must never be blocked by a stale counter, so the
//! counter clamps and the delta ledger keeps the true movement for sync.

use tracing::info;

use crate::error::PosResult;
use nadi_core::validation::{validate_price, validate_product_name, validate_threshold};
use nadi_core::{
    CoreError, Money, ProductWithStock, StockLevel, DEFAULT_LOW_STOCK_THRESHOLD,
};
use nadi_store::{RemoveOutcome, Store};

/// A low-stock report row: the product plus its classification.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LowStockItem {
    pub product: ProductWithStock,
    pub level: StockLevel,
}

/// Service over the product catalog and stock counters.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    store: Store,
}

impl InventoryLedger {
    /// Creates a ledger over the given store.
    pub fn new(store: Store) -> Self {
        InventoryLedger { store }
    }

    /// Adds a product with an initial stock count.
    pub async fn add_product(
        &self,
        name: &str,
        price: Money,
        initial_stock: i64,
    ) -> PosResult<ProductWithStock> {
        validate_product_name(name)?;
        validate_price(price)?;

        let product = self
            .store
            .products()
            .insert(name.trim(), price, initial_stock.max(0))
            .await?;

        info!(id = %product.id, name = %product.name, "Product added");

        // Freshly inserted, so the join view is just the row we wrote.
        Ok(ProductWithStock {
            id: product.id,
            name: product.name,
            price: product.price,
            is_active: product.is_active,
            stock: initial_stock.max(0),
            updated_at: product.updated_at,
            sync_status: product.sync_status,
        })
    }

    /// Updates a product's name and/or price. Omitted fields keep their
    /// value.
    pub async fn update_product(
        &self,
        id: &str,
        name: Option<&str>,
        price: Option<Money>,
    ) -> PosResult<()> {
        if let Some(name) = name {
            validate_product_name(name)?;
        }
        if let Some(price) = price {
            validate_price(price)?;
        }

        self.store
            .products()
            .update_info(id, name.map(str::trim), price)
            .await?;
        Ok(())
    }

    /// Removes a product: deleted outright when no sale references it,
    /// retired in place otherwise.
    pub async fn remove_product(&self, id: &str) -> PosResult<RemoveOutcome> {
        let outcome = self.store.products().remove(id).await?;
        info!(id = %id, ?outcome, "Product removed");
        Ok(outcome)
    }

    /// Active products with their stock, sorted by name.
    pub async fn products(&self) -> PosResult<Vec<ProductWithStock>> {
        Ok(self.store.products().list().await?)
    }

    /// Adjusts stock by a delta; the result saturates at zero.
    ///
    /// Returns the new stock count.
    pub async fn adjust_stock(&self, product_id: &str, delta: i64) -> PosResult<i64> {
        self.require_product(product_id).await?;
        let reason = if delta < 0 { "adjustment" } else { "restock" };
        Ok(self
            .store
            .inventory()
            .adjust_stock(product_id, delta, reason)
            .await?)
    }

    /// Sets stock to an absolute count (stocktake edit).
    pub async fn set_stock(&self, product_id: &str, stock: i64) -> PosResult<i64> {
        self.require_product(product_id).await?;
        Ok(self.store.inventory().set_stock(product_id, stock).await?)
    }

    /// Current stock for a product (0 when no counter row exists).
    pub async fn stock_of(&self, product_id: &str) -> PosResult<i64> {
        Ok(self.store.inventory().stock_of(product_id).await?)
    }

    /// Products at or below the threshold, lowest stock first, each with
    /// its [`StockLevel`]. Uses [`DEFAULT_LOW_STOCK_THRESHOLD`] when
    /// `threshold` is `None`.
    pub async fn low_stock(&self, threshold: Option<i64>) -> PosResult<Vec<LowStockItem>> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
        validate_threshold(threshold)?;

        let products = self.store.inventory().low_stock(threshold).await?;
        Ok(products
            .into_iter()
            .map(|product| LowStockItem {
                level: product.stock_level(threshold),
                product,
            })
            .collect())
    }

    async fn require_product(&self, product_id: &str) -> PosResult<()> {
        match self.store.products().get(product_id).await? {
            Some(_) => Ok(()),
            None => Err(CoreError::ProductNotFound(product_id.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosError;
    use nadi_store::StoreConfig;

    async fn ledger() -> InventoryLedger {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        InventoryLedger::new(store)
    }

    #[tokio::test]
    async fn test_add_and_list_products() {
        let ledger = ledger().await;

        ledger
            .add_product("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();
        ledger
            .add_product("Es Teh", Money::from_minor(5_000), 20)
            .await
            .unwrap();

        let products = ledger.products().await.unwrap();
        assert_eq!(products.len(), 2);
        // Sorted by name.
        assert_eq!(products[0].name, "Es Teh");
    }

    #[tokio::test]
    async fn test_add_product_validates_input() {
        let ledger = ledger().await;

        assert!(ledger
            .add_product("", Money::from_minor(1_000), 1)
            .await
            .is_err());
        assert!(ledger
            .add_product("Kopi", Money::from_minor(-1), 1)
            .await
            .is_err());
        // Negative initial stock clamps to zero instead of failing.
        let p = ledger
            .add_product("Roti", Money::from_minor(8_000), -5)
            .await
            .unwrap();
        assert_eq!(p.stock, 0);
    }

    #[tokio::test]
    async fn test_adjust_stock_clamps_and_reports_new_value() {
        let ledger = ledger().await;
        let p = ledger
            .add_product("Kopi", Money::from_minor(18_000), 3)
            .await
            .unwrap();

        assert_eq!(ledger.adjust_stock(&p.id, -2).await.unwrap(), 1);
        assert_eq!(ledger.adjust_stock(&p.id, -9).await.unwrap(), 0);
        assert_eq!(ledger.stock_of(&p.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjust_unknown_product_is_domain_error() {
        let ledger = ledger().await;
        let err = ledger.adjust_stock("ghost", -1).await.unwrap_err();
        assert!(matches!(
            err,
            PosError::Core(CoreError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_low_stock_classification_and_order() {
        let ledger = ledger().await;
        ledger
            .add_product("Out", Money::from_minor(1_000), 0)
            .await
            .unwrap();
        ledger
            .add_product("Low", Money::from_minor(1_000), 4)
            .await
            .unwrap();
        ledger
            .add_product("Fine", Money::from_minor(1_000), 50)
            .await
            .unwrap();

        let report = ledger.low_stock(None).await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].product.name, "Out");
        assert_eq!(report[0].level, StockLevel::Critical);
        assert_eq!(report[1].product.name, "Low");
        assert_eq!(report[1].level, StockLevel::Low);
    }
}
