//! # nadi-store: Durable Local Store for Nadi POS
//!
//! Offline-first persistence for the point-of-sale core. SQLite is the
//! on-device source of truth: every sale, stock movement, and cart edit
//! is durably recorded here before any network round-trip, stamped with a
//! `sync_status` marker for the sync engine to drain later.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Nadi POS Data Flow                            │
//! │                                                                     │
//! │  Service call (add_item, commit_sale, adjust_stock)                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                   nadi-store (THIS CRATE)                     │ │
//! │  │                                                               │ │
//! │  │   ┌─────────────┐   ┌───────────────┐   ┌─────────────────┐  │ │
//! │  │   │    Store    │   │ Repositories  │   │     Schema      │  │ │
//! │  │   │  (pool.rs)  │◄──│ product, cart │   │ (additive DDL,  │  │ │
//! │  │   │ SqlitePool  │   │ inventory, tx │   │  idempotent)    │  │ │
//! │  │   └─────────────┘   └───────────────┘   └─────────────────┘  │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database (nadi_pos.db, WAL mode)                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Store handle and connection pool configuration
//! - [`schema`] - Additive idempotent schema applied at startup
//! - [`error`] - Store error taxonomy
//! - [`repository`] - Repository implementations per entity family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nadi_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new("data/nadi_pos.db")).await?;
//! let products = store.products().list().await?;
//! ```

pub mod error;
pub mod pool;
pub mod repository;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use pool::{Store, StoreConfig};

pub use repository::cart::CartRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::meta::MetaRepository;
pub use repository::new_row_id;
pub use repository::product::{ProductRepository, RemoveOutcome};
pub use repository::transaction::TransactionRepository;
