//! # Local Meta Repository
//!
//! Simple key/value storage in `local_meta`: the shop profile used on
//! report headers, the device identity, and the persisted sync cursor.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use nadi_core::SyncCursor;

// Well-known keys. The sync engine writes the cursor keys inside its own
// pull transaction, so they are part of the store's public contract.
pub const KEY_SHOP_NAME: &str = "shop_name";
pub const KEY_SHOP_EMAIL: &str = "shop_email";
pub const KEY_SHOP_PHONE: &str = "shop_phone";
pub const KEY_SHOP_ADDRESS: &str = "shop_address";
pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_CURSOR_PRODUCTS: &str = "sync.last_product_updated_at";
pub const KEY_CURSOR_TRANSACTIONS: &str = "sync.last_tx_updated_at";

/// Repository for the `local_meta` key/value table.
#[derive(Debug, Clone)]
pub struct MetaRepository {
    pool: SqlitePool,
}

impl MetaRepository {
    /// Creates a new MetaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MetaRepository { pool }
    }

    /// Reads a value.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM local_meta WHERE key = ?1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    /// Writes a value, replacing any previous one.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query("INSERT OR REPLACE INTO local_meta (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Deletes a key.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM local_meta WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Returns the stable device id, minting one on first call.
    pub async fn device_id(&self) -> StoreResult<String> {
        if let Some(id) = self.get(KEY_DEVICE_ID).await? {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        debug!(device_id = %id, "Minting device id");
        self.set(KEY_DEVICE_ID, &id).await?;
        Ok(id)
    }

    // =========================================================================
    // Sync cursor
    // =========================================================================

    /// Loads the persisted sync cursor. Missing keys read as an untouched
    /// cursor (everything still to pull).
    pub async fn load_cursor(&self) -> StoreResult<SyncCursor> {
        let products = self.get(KEY_CURSOR_PRODUCTS).await?;
        let transactions = self.get(KEY_CURSOR_TRANSACTIONS).await?;

        Ok(SyncCursor {
            last_product_updated_at: parse_watermark(products.as_deref())?,
            last_tx_updated_at: parse_watermark(transactions.as_deref())?,
        })
    }

    /// Persists the sync cursor.
    ///
    /// The pull path instead writes these keys inside its batch-apply
    /// transaction; this method is for re-provisioning and tests.
    pub async fn save_cursor(&self, cursor: &SyncCursor) -> StoreResult<()> {
        match cursor.last_product_updated_at {
            Some(ts) => self.set(KEY_CURSOR_PRODUCTS, &ts.to_rfc3339()).await?,
            None => self.delete(KEY_CURSOR_PRODUCTS).await?,
        }
        match cursor.last_tx_updated_at {
            Some(ts) => self.set(KEY_CURSOR_TRANSACTIONS, &ts.to_rfc3339()).await?,
            None => self.delete(KEY_CURSOR_TRANSACTIONS).await?,
        }

        Ok(())
    }
}

fn parse_watermark(value: Option<&str>) -> StoreResult<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| StoreError::Io(format!("Corrupt sync watermark '{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Store, StoreConfig};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let meta = store.meta();

        meta.set(KEY_SHOP_NAME, "Warung Nadi").await.unwrap();
        assert_eq!(
            meta.get(KEY_SHOP_NAME).await.unwrap().as_deref(),
            Some("Warung Nadi")
        );
        assert!(meta.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_device_id_is_stable() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let meta = store.meta();

        let first = meta.device_id().await.unwrap();
        let second = meta.device_id().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cursor_roundtrip() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        let meta = store.meta();

        assert_eq!(meta.load_cursor().await.unwrap(), SyncCursor::default());

        let cursor = SyncCursor {
            last_product_updated_at: Some(Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()),
            last_tx_updated_at: None,
        };
        meta.save_cursor(&cursor).await.unwrap();
        assert_eq!(meta.load_cursor().await.unwrap(), cursor);
    }
}
