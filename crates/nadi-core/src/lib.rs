//! # nadi-core: Pure Business Logic for Nadi POS
//!
//! This crate contains the domain model of the point-of-sale system as
//! pure types and functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Nadi POS Architecture                          │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                 ★ nadi-core (THIS CRATE) ★                    │ │
//! │  │                                                               │ │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐  │ │
//! │  │   │   types   │  │   money   │  │   error   │  │validation│  │ │
//! │  │   │  Product  │  │   Money   │  │ CoreError │  │  rules   │  │ │
//! │  │   │ SaleTx    │  │  (rupiah) │  │           │  │  checks  │  │ │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └──────────┘  │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                 nadi-store (Durable Local Store)              │ │
//! │  │            SQLite schema, repositories, sale writer           │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, SaleTransaction, CartLine, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic - same input, same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all amounts are integer rupiah (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Default tenant ID for a single-shop deployment.
///
/// The local schema is tenant-agnostic, but every remote row is scoped by
/// tenant id. Until device provisioning assigns a real tenant this constant
/// keeps pushed rows addressable.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Stock at or below this count is flagged "low" on the dashboard.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Maximum quantity of a single line in a cart.
///
/// Guards against fat-finger entries (typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
