//! # Schema Setup
//!
//! Additive, idempotent schema for the on-device database.
//!
//! ## How Schema Setup Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Startup Sequence                               │
//! │                                                                     │
//! │  Store::open()                                                      │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Run CREATE TABLE IF NOT EXISTS ... for every table                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Run CREATE INDEX IF NOT EXISTS ... for every index                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ensure_column() upgrades: ALTER TABLE ADD COLUMN for columns       │
//! │  introduced after a database file was first created                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Store ready                                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement is safe to re-apply on every launch. Changes are only
//! ever additive: columns are added, never dropped or retyped, so a
//! database written by an older build always opens cleanly.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Table DDL, ordered so foreign key targets exist before their referents.
const TABLES: &[&str] = &[
    // Simple key/value storage: shop profile, device id, sync cursor.
    r#"
    CREATE TABLE IF NOT EXISTS local_meta (
        key   TEXT PRIMARY KEY,
        value TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id            TEXT PRIMARY KEY,
        name          TEXT NOT NULL,
        price         INTEGER NOT NULL,
        is_active     INTEGER NOT NULL DEFAULT 1,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        sync_status   TEXT NOT NULL DEFAULT 'pending',
        sync_attempts INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_cache (
        product_id TEXT PRIMARY KEY,
        stock      INTEGER NOT NULL CHECK (stock >= 0),
        updated_at TEXT NOT NULL,
        FOREIGN KEY (product_id) REFERENCES products (id)
    )
    "#,
    // CRDT-style ledger of local stock movements. Pending rows are what
    // pull-reconciliation replays on top of a remote baseline.
    r#"
    CREATE TABLE IF NOT EXISTS inventory_deltas (
        id            TEXT PRIMARY KEY,
        product_id    TEXT NOT NULL,
        delta         INTEGER NOT NULL,
        reason        TEXT,
        created_at    TEXT NOT NULL,
        sync_status   TEXT NOT NULL DEFAULT 'pending',
        sync_attempts INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (product_id) REFERENCES products (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_draft (
        id         TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        id         TEXT PRIMARY KEY,
        cart_id    TEXT NOT NULL,
        product_id TEXT NOT NULL,
        qty        INTEGER NOT NULL CHECK (qty >= 1),
        price      INTEGER NOT NULL,
        FOREIGN KEY (cart_id) REFERENCES cart_draft (id) ON DELETE CASCADE,
        FOREIGN KEY (product_id) REFERENCES products (id),
        UNIQUE (cart_id, product_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions_local (
        id            TEXT PRIMARY KEY,
        subtotal      INTEGER NOT NULL,
        tax           INTEGER NOT NULL,
        discount      INTEGER NOT NULL,
        total         INTEGER NOT NULL,
        status        TEXT NOT NULL,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        sync_status   TEXT NOT NULL DEFAULT 'pending',
        sync_attempts INTEGER NOT NULL DEFAULT 0,
        server_id     TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transaction_items_local (
        id             TEXT PRIMARY KEY,
        transaction_id TEXT NOT NULL,
        product_id     TEXT NOT NULL,
        qty            INTEGER NOT NULL,
        price          INTEGER NOT NULL,
        sync_status    TEXT NOT NULL DEFAULT 'pending',
        FOREIGN KEY (transaction_id) REFERENCES transactions_local (id) ON DELETE CASCADE,
        FOREIGN KEY (product_id) REFERENCES products (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payment_attempts_local (
        id             TEXT PRIMARY KEY,
        transaction_id TEXT NOT NULL,
        method         TEXT NOT NULL,
        status         TEXT NOT NULL,
        provider_ref   TEXT,
        sync_status    TEXT NOT NULL DEFAULT 'pending',
        FOREIGN KEY (transaction_id) REFERENCES transactions_local (id) ON DELETE CASCADE
    )
    "#,
];

/// Index DDL, applied after the tables.
const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_products_sync ON products (sync_status)",
    "CREATE INDEX IF NOT EXISTS idx_deltas_product_sync ON inventory_deltas (product_id, sync_status)",
    "CREATE INDEX IF NOT EXISTS idx_cart_items_cart ON cart_items (cart_id)",
    "CREATE INDEX IF NOT EXISTS idx_tx_sync ON transactions_local (sync_status)",
    "CREATE INDEX IF NOT EXISTS idx_tx_created ON transactions_local (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_tx_items_tx ON transaction_items_local (transaction_id)",
    "CREATE INDEX IF NOT EXISTS idx_payments_tx ON payment_attempts_local (transaction_id)",
];

/// Applies the full schema. Safe to call on every launch.
pub async fn apply(pool: &SqlitePool) -> StoreResult<()> {
    debug!("Applying schema");

    for ddl in TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
    }

    // Additive upgrades for databases created before these columns existed.
    // CREATE TABLE IF NOT EXISTS does not touch existing tables, so older
    // files need the ALTER path.
    ensure_column(pool, "products", "is_active", "is_active INTEGER NOT NULL DEFAULT 1").await?;
    ensure_column(
        pool,
        "products",
        "sync_attempts",
        "sync_attempts INTEGER NOT NULL DEFAULT 0",
    )
    .await?;
    ensure_column(
        pool,
        "transactions_local",
        "sync_attempts",
        "sync_attempts INTEGER NOT NULL DEFAULT 0",
    )
    .await?;
    ensure_column(pool, "transactions_local", "server_id", "server_id TEXT").await?;

    info!("Schema applied");
    Ok(())
}

/// Adds a column if the table does not already have it.
///
/// SQLite has no `ADD COLUMN IF NOT EXISTS`, so presence is checked via
/// `pragma_table_info` first.
async fn ensure_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> StoreResult<()> {
    let present: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table)
            .bind(column)
            .fetch_optional(pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;

    if present.is_none() {
        debug!(table, column, "Adding missing column");
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {definition}"))
            .execute(pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn bare_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .in_memory(true)
                    .foreign_keys(true),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let pool = bare_pool().await;
        apply(&pool).await.unwrap();
        apply(&pool).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'products'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_ensure_column_upgrades_old_table() {
        let pool = bare_pool().await;

        // Simulate a database created by an older build.
        sqlx::query("CREATE TABLE products (id TEXT PRIMARY KEY, name TEXT NOT NULL, price INTEGER NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL, sync_status TEXT NOT NULL DEFAULT 'pending')")
            .execute(&pool)
            .await
            .unwrap();

        apply(&pool).await.unwrap();

        let present: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pragma_table_info('products') WHERE name = 'is_active'")
                .fetch_optional(&pool)
                .await
                .unwrap();
        assert!(present.is_some());
    }
}
