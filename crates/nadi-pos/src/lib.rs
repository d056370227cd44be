//! # nadi-pos: Application Services for Nadi POS
//!
//! The service layer a UI talks to. Each service is constructed with an
//! explicit [`Store`](nadi_store::Store) handle -- there is no hidden
//! global -- which keeps every test on its own in-memory database.
//!
//! ## Services
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Service Layer                                │
//! │                                                                     │
//! │  CartAggregate     the active cart with a write-through             │
//! │                    in-memory projection                             │
//! │                                                                     │
//! │  Checkout          turns the cart into a durable sale:              │
//! │                    header + items + payment + stock, atomically     │
//! │                                                                     │
//! │  InventoryLedger   catalog CRUD and clamped stock counters          │
//! │                                                                     │
//! │  Reports           order history, period summaries, shop profile    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything works fully offline; rows the services write are stamped
//! `pending` and drained later by the sync engine (`nadi-sync`).

pub mod cart;
pub mod checkout;
pub mod error;
pub mod inventory;
pub mod reports;

pub use cart::{CartAggregate, CartView};
pub use checkout::{Checkout, Order, OrderLine};
pub use error::{PosError, PosResult};
pub use inventory::{InventoryLedger, LowStockItem};
pub use reports::{Reports, SalesSummary, ShopProfile};
