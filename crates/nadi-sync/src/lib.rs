//! # nadi-sync: Sync Engine for Nadi POS
//!
//! Eventual-consistency reconciliation between the on-device store and
//! the remote multi-tenant backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        nadi-sync                                    │
//! │                                                                     │
//! │  ┌─────────────┐  ┌──────────────┐  ┌───────────────────────────┐  │
//! │  │ SyncEngine  │  │ CursorStore  │  │  RemoteBackend (trait)    │  │
//! │  │ (engine.rs) │  │ (cursor.rs)  │  │  (remote.rs)              │  │
//! │  │             │  │              │  │                           │  │
//! │  │ push FK-    │◄─│ per-device   │  │ row-shape contract with   │  │
//! │  │ ordered,    │  │ watermarks,  │◄─│ the tenant backend; the   │  │
//! │  │ pull + LWW/ │  │ monotonic    │  │ wire transport is an      │  │
//! │  │ delta replay│  │              │  │ external collaborator     │  │
//! │  └─────────────┘  └──────────────┘  └───────────────────────────┘  │
//! │                                                                     │
//! │  ┌─────────────┐  ┌──────────────┐                                  │
//! │  │ SyncConfig  │  │ reconcile    │                                  │
//! │  │ (TOML+env)  │  │ (pure rules) │                                  │
//! │  └─────────────┘  └──────────────┘                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Local operations never wait on sync; network failures leave rows
//!   `pending` and the next cycle retries.
//! - Push order respects foreign keys: products, stock deltas, then
//!   transaction bundles.
//! - Pull applies a whole batch plus the cursor advance in one local
//!   transaction; the cursor is monotonic and never moves past rows that
//!   did not durably apply.
//! - Products reconcile last-writer-wins by `updated_at`; stock is a
//!   counter rebased by replaying pending local deltas; transactions are
//!   append-only and local ones are never overwritten.

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod remote;

pub use config::{SyncConfig, SyncMode};
pub use cursor::CursorStore;
pub use engine::{SyncEngine, SyncOutcome, SyncPhase, SyncRunner};
pub use error::{SyncError, SyncResult};
pub use remote::{
    BoxFuture, RemoteBackend, RemotePaymentIntent, RemoteProduct, RemoteStockDelta,
    RemoteTransaction, RemoteTransactionItem, RowAck, TransactionBundle,
};
