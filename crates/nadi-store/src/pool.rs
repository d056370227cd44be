//! # Database Pool Management
//!
//! Connection pool creation and configuration for the on-device SQLite
//! database.
//!
//! ## WAL Mode
//! WAL (Write-Ahead Logging) is enabled because a POS terminal reads
//! constantly (product list, cart view) while sales commit in the
//! background: readers don't block the single writer and crash recovery is
//! stronger than rollback-journal mode.
//!
//! ## Ownership
//! The database file is exclusively owned by the running app instance;
//! concurrency inside the process is serialized by SQLite's transaction
//! mechanism, not by external locks.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::repository::cart::CartRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::meta::MetaRepository;
use crate::repository::product::ProductRepository;
use crate::repository::transaction::TransactionRepository;
use crate::schema;

// =============================================================================
// Configuration
// =============================================================================

/// Store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/data/nadi_pos.db").max_connections(5);
/// let store = Store::open(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Use a private in-memory database instead of a file (tests).
    pub in_memory: bool,

    /// Maximum number of connections in the pool.
    /// Default: 5 (plenty for a single-terminal app)
    pub max_connections: u32,

    /// Connection acquire timeout.
    pub connect_timeout: Duration,

    /// Whether to apply the schema on open.
    /// Default: true
    pub apply_schema: bool,
}

impl StoreConfig {
    /// Creates a configuration pointing at a database file. The file is
    /// created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: path.into(),
            in_memory: false,
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
            apply_schema: true,
        }
    }

    /// Creates an isolated in-memory configuration (for tests).
    ///
    /// In-memory databases live and die with their single connection, so
    /// the pool is pinned to one connection.
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: PathBuf::new(),
            in_memory: true,
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            apply_schema: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets whether the schema is applied on open.
    pub fn apply_schema(mut self, apply: bool) -> Self {
        self.apply_schema = apply;
        self
    }
}

// =============================================================================
// Store
// =============================================================================

/// Main store handle providing repository access.
///
/// A `Store` is cheap to clone (it wraps a pool) and is constructed once
/// at startup, then passed explicitly to every component that needs it --
/// there is no process-wide singleton, which keeps tests isolated on
/// fresh in-memory stores.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens the store: builds the pool and applies the schema.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite for POS workloads:
    ///    - WAL journal for concurrent reads
    ///    - NORMAL synchronous (safe from corruption, fast commits)
    ///    - foreign keys ON (SQLite defaults them off)
    /// 3. Creates the connection pool
    /// 4. Applies the additive schema (if enabled)
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        if config.in_memory {
            info!("Opening in-memory store");
        } else {
            info!(path = %config.database_path.display(), "Opening store");
        }

        let mut options = SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        options = if config.in_memory {
            options.in_memory(true)
        } else {
            options.filename(&config.database_path)
        };

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Store { pool };

        if config.apply_schema {
            schema::apply(&store.pool).await?;
        }

        info!(max_connections = config.max_connections, "Store ready");
        Ok(store)
    }

    /// Returns a reference to the connection pool.
    ///
    /// For queries not covered by the repositories (the sync engine's
    /// batch-apply path uses this to group work into one transaction).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    /// Returns the inventory repository.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    /// Returns the cart repository.
    pub fn carts(&self) -> CartRepository {
        CartRepository::new(self.pool.clone())
    }

    /// Returns the transaction repository.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    /// Returns the local_meta key/value repository.
    pub fn meta(&self) -> MetaRepository {
        MetaRepository::new(self.pool.clone())
    }

    /// Checks that the store can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Closes the connection pool. Call on shutdown.
    pub async fn close(&self) {
        info!("Closing store connection pool");
        self.pool.close().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = Store::open(StoreConfig::in_memory()).await.unwrap();
        assert!(store.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = StoreConfig::new("/tmp/nadi_test.db").max_connections(10);
        assert_eq!(config.max_connections, 10);
        assert!(!config.in_memory);
    }
}
