//! # Cursor Store
//!
//! Persistence for the per-device, per-tenant [`SyncCursor`].
//!
//! The cursor bounds every pull query: only remote rows with
//! `updated_at` past the watermark are requested. It advances only after
//! a full pull batch has durably applied (the pull path writes the
//! cursor keys inside its batch transaction), and it never moves
//! backwards except through [`CursorStore::reset_for_reprovisioning`].

use tracing::{info, warn};

use crate::error::SyncResult;
use nadi_core::SyncCursor;
use nadi_store::Store;

/// Loads and saves the sync cursor through `local_meta`.
#[derive(Debug, Clone)]
pub struct CursorStore {
    store: Store,
}

impl CursorStore {
    /// Creates a cursor store over the given local store.
    pub fn new(store: Store) -> Self {
        CursorStore { store }
    }

    /// Loads the persisted cursor; a fresh device reads as "pull
    /// everything".
    pub async fn load(&self) -> SyncResult<SyncCursor> {
        Ok(self.store.meta().load_cursor().await?)
    }

    /// Persists the cursor outside a pull batch. Refuses to rewind.
    pub async fn save(&self, cursor: &SyncCursor) -> SyncResult<()> {
        let current = self.load().await?;

        // Monotonicity guard: a rewind here means a bug upstream, not a
        // legitimate state change.
        let rewinds_products = match (current.last_product_updated_at, cursor.last_product_updated_at)
        {
            (Some(cur), Some(new)) => new < cur,
            (Some(_), None) => true,
            _ => false,
        };
        let rewinds_txs = match (current.last_tx_updated_at, cursor.last_tx_updated_at) {
            (Some(cur), Some(new)) => new < cur,
            (Some(_), None) => true,
            _ => false,
        };

        if rewinds_products || rewinds_txs {
            warn!(?current, ?cursor, "Refusing to rewind sync cursor");
            return Ok(());
        }

        self.store.meta().save_cursor(cursor).await?;
        Ok(())
    }

    /// Clears both watermarks. Only for explicit device re-provisioning:
    /// the next pull re-reads the full remote history.
    pub async fn reset_for_reprovisioning(&self) -> SyncResult<()> {
        info!("Resetting sync cursor for device re-provisioning");
        self.store.meta().save_cursor(&SyncCursor::default()).await?;
        Ok(())
    }
}
