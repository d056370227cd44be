//! # Reports
//!
//! Order history and period summaries over the committed transactions,
//! plus the shop profile header that tops every printed report.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::checkout::{Checkout, Order};
use crate::error::PosResult;
use nadi_core::{Money, PaymentMethod, ValidationError};
use nadi_store::repository::meta::{
    KEY_SHOP_ADDRESS, KEY_SHOP_EMAIL, KEY_SHOP_NAME, KEY_SHOP_PHONE,
};
use nadi_store::Store;

/// Shop identity shown on report and receipt headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShopProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Totals for a reporting period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub order_count: usize,
    pub gross_total: Money,
    /// Gross per payment method, in fixed Cash/Qris/Debit order.
    pub by_method: Vec<(PaymentMethod, Money)>,
}

/// Reporting queries over committed sales.
#[derive(Debug, Clone)]
pub struct Reports {
    store: Store,
    checkout: Checkout,
}

impl Reports {
    /// Creates a reports service over the given store.
    pub fn new(store: Store) -> Self {
        let checkout = Checkout::new(store.clone());
        Reports { store, checkout }
    }

    /// Orders committed inside `[start, end]`, oldest first.
    pub async fn orders_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PosResult<Vec<Order>> {
        let sales = self.store.transactions().list_range(start, end).await?;

        let mut orders = Vec::with_capacity(sales.len());
        for sale in &sales {
            if let Some(order) = self.checkout.order(&sale.id).await? {
                orders.push(order);
            }
        }

        Ok(orders)
    }

    /// Orders for one calendar month (`month` is 1-12).
    pub async fn orders_for_month(&self, year: i32, month: u32) -> PosResult<Vec<Order>> {
        let start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            })?;

        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            })?
            - chrono::Duration::seconds(1);

        self.orders_in_range(start, end).await
    }

    /// Period totals with a per-payment-method breakdown.
    pub async fn sales_summary(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PosResult<SalesSummary> {
        let orders = self.orders_in_range(start, end).await?;

        let gross_total: Money = orders.iter().map(|o| o.total_amount).sum();
        let by_method = [PaymentMethod::Cash, PaymentMethod::Qris, PaymentMethod::Debit]
            .into_iter()
            .map(|method| {
                let total = orders
                    .iter()
                    .filter(|o| o.payment_method == method)
                    .map(|o| o.total_amount)
                    .sum();
                (method, total)
            })
            .collect();

        Ok(SalesSummary {
            order_count: orders.len(),
            gross_total,
            by_method,
        })
    }

    /// Reads the shop profile from `local_meta`.
    pub async fn shop_profile(&self) -> PosResult<ShopProfile> {
        let meta = self.store.meta();
        Ok(ShopProfile {
            name: meta.get(KEY_SHOP_NAME).await?,
            email: meta.get(KEY_SHOP_EMAIL).await?,
            phone: meta.get(KEY_SHOP_PHONE).await?,
            address: meta.get(KEY_SHOP_ADDRESS).await?,
        })
    }

    /// Stores the shop profile; `None` fields are left untouched.
    pub async fn update_shop_profile(&self, profile: &ShopProfile) -> PosResult<()> {
        let meta = self.store.meta();
        if let Some(name) = &profile.name {
            meta.set(KEY_SHOP_NAME, name).await?;
        }
        if let Some(email) = &profile.email {
            meta.set(KEY_SHOP_EMAIL, email).await?;
        }
        if let Some(phone) = &profile.phone {
            meta.set(KEY_SHOP_PHONE, phone).await?;
        }
        if let Some(address) = &profile.address {
            meta.set(KEY_SHOP_ADDRESS, address).await?;
        }
        Ok(())
    }
}

/// True when the timestamp falls in the given calendar month.
pub fn in_month(date: DateTime<Utc>, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartAggregate;
    use nadi_store::StoreConfig;

    async fn store_with_orders() -> (Store, Reports) {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), 100)
            .await
            .unwrap();

        let cart = CartAggregate::new(store.clone());
        let checkout = Checkout::new(store.clone());

        cart.add_item(&product.id, 2).await.unwrap();
        checkout.commit_sale(&cart, PaymentMethod::Cash).await.unwrap();

        cart.add_item(&product.id, 1).await.unwrap();
        checkout.commit_sale(&cart, PaymentMethod::Qris).await.unwrap();

        let reports = Reports::new(store.clone());
        (store, reports)
    }

    fn wide_range() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - chrono::Duration::days(1), now + chrono::Duration::days(1))
    }

    #[tokio::test]
    async fn test_orders_in_range_and_summary() {
        let (_store, reports) = store_with_orders().await;
        let (start, end) = wide_range();

        let orders = reports.orders_in_range(start, end).await.unwrap();
        assert_eq!(orders.len(), 2);

        let summary = reports.sales_summary(start, end).await.unwrap();
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.gross_total, Money::from_minor(54_000));

        let cash = summary
            .by_method
            .iter()
            .find(|(m, _)| *m == PaymentMethod::Cash)
            .unwrap();
        assert_eq!(cash.1, Money::from_minor(36_000));
        let debit = summary
            .by_method
            .iter()
            .find(|(m, _)| *m == PaymentMethod::Debit)
            .unwrap();
        assert_eq!(debit.1, Money::zero());
    }

    #[tokio::test]
    async fn test_orders_for_month_matches_current_month() {
        let (_store, reports) = store_with_orders().await;
        let now = Utc::now();

        let orders = reports
            .orders_for_month(now.year(), now.month())
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| in_month(o.date, now.year(), now.month())));

        assert!(reports.orders_for_month(2026, 13).await.is_err());
    }

    #[tokio::test]
    async fn test_shop_profile_roundtrip() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let reports = Reports::new(store);

        assert_eq!(reports.shop_profile().await.unwrap(), ShopProfile::default());

        reports
            .update_shop_profile(&ShopProfile {
                name: Some("Warung Nadi".into()),
                phone: Some("+62 812 0000 1111".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let profile = reports.shop_profile().await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Warung Nadi"));
        assert_eq!(profile.phone.as_deref(), Some("+62 812 0000 1111"));
        assert!(profile.email.is_none());
    }
}
