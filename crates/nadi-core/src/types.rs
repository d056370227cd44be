//! # Domain Types
//!
//! Core domain types used throughout Nadi POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                               │
//! │                                                                     │
//! │  ┌────────────────┐  ┌──────────────────┐  ┌───────────────────┐   │
//! │  │    Product     │  │ SaleTransaction  │  │  PaymentAttempt   │   │
//! │  │  ────────────  │  │  ──────────────  │  │  ───────────────  │   │
//! │  │  id (UUIDv7)   │  │  id (UUIDv7)     │  │  id (UUIDv7)      │   │
//! │  │  name          │  │  subtotal/total  │  │  method           │   │
//! │  │  price         │  │  status          │  │  status           │   │
//! │  │  sync_status   │  │  sync_status     │  │  sync_status      │   │
//! │  └───────┬────────┘  └────────┬─────────┘  └───────────────────┘   │
//! │          │ 1:1               │ 1:N                                 │
//! │  ┌───────▼────────┐  ┌────────▼─────────┐  ┌───────────────────┐   │
//! │  │ InventoryCount │  │ TransactionItem  │  │    StockDelta     │   │
//! │  │  stock >= 0    │  │  frozen price    │  │  CRDT ledger row  │   │
//! │  └────────────────┘  └──────────────────┘  └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every locally mutated row carries a [`SyncStatus`] marker; rows move
//! `pending → synced` only once the remote backend has accepted them, and
//! to `failed` after the push retry budget is exhausted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Sync Status
// =============================================================================

/// Synchronization state of a locally stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Created or mutated locally; not yet accepted by the remote store.
    Pending,
    /// The remote store has durably accepted this row.
    Synced,
    /// Push retries exhausted; needs operator attention.
    Failed,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Pending
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Payment Method / Status
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash at the counter.
    Cash,
    /// QRIS standing QR payment.
    Qris,
    /// Debit card on an external terminal.
    Debit,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Qris => write!(f, "qris"),
            PaymentMethod::Debit => write!(f, "debit"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "qris" => Ok(PaymentMethod::Qris),
            "debit" => Ok(PaymentMethod::Debit),
            other => Err(crate::error::ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown method '{other}'"),
            }),
        }
    }
}

/// Outcome of a single payment attempt.
///
/// A transaction may accumulate several attempts (retries against a
/// provider), but at most one ever reaches `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Status of a committed sale.
///
/// Locally only `Completed` rows are ever created; `Voided` exists for
/// parity with the remote `transactions` table, whose rows may arrive via
/// pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Voided,
}

// =============================================================================
// Stock Level
// =============================================================================

/// Dashboard classification of a product's stock count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// Completely out of stock.
    Critical,
    /// In stock but at or below the alert threshold.
    Low,
    /// Comfortably stocked.
    Good,
}

impl StockLevel {
    /// Classifies a stock count against a threshold.
    ///
    /// `critical` is exactly zero, `low` is `0 < stock <= threshold`.
    pub fn classify(stock: i64, threshold: i64) -> Self {
        if stock <= 0 {
            StockLevel::Critical
        } else if stock <= threshold {
            StockLevel::Low
        } else {
            StockLevel::Good
        }
    }
}

// =============================================================================
// Product & Inventory
// =============================================================================

/// A product available for sale.
///
/// Identity is a stable opaque id shared with the remote `products` table
/// once synced. Name and price are mutable; a product referenced by
/// historical transaction items is never hard-deleted, only retired
/// (`is_active = false`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    /// False once retired; retired products stay referenceable by history.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

/// Per-product stock counter (1:1 with [`Product`]).
///
/// Invariant: `stock >= 0` always. A product without a count row is
/// treated as stock 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryCount {
    pub product_id: String,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
}

/// A product joined with its stock count, the shape inventory screens read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductWithStock {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub is_active: bool,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl ProductWithStock {
    /// Classifies this product's stock against a threshold.
    pub fn stock_level(&self, threshold: i64) -> StockLevel {
        StockLevel::classify(self.stock, threshold)
    }
}

/// One local stock movement, recorded in the same transaction as the
/// write that caused it.
///
/// Deltas are the unit of stock synchronization: stock is not
/// last-writer-wins, so pending deltas are replayed on top of any pulled
/// remote baseline and pushed as increments the remote can apply without
/// clobbering concurrent sales from sibling devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockDelta {
    pub id: String,
    pub product_id: String,
    pub delta: i64,
    /// What caused the movement ("sale", "restock", "adjustment").
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

// =============================================================================
// Cart
// =============================================================================

/// A draft cart row. Exactly one draft is "active" at a time per device;
/// the most recently created row wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartDraft {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A line in the draft cart.
///
/// `price` is captured when the line is added, not re-read from the
/// product, so later price edits never retroactively change a cart total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,
    /// Invariant: `qty >= 1`; a request for less removes the line.
    pub qty: i64,
    pub price: Money,
}

impl CartLine {
    /// Line total: frozen unit price times quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.times(self.qty)
    }
}

// =============================================================================
// Sale Transaction
// =============================================================================

/// A committed sale. Immutable once created except for `sync_status` and
/// `server_id` transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleTransaction {
    pub id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    /// Remote row id once the push has been acknowledged.
    pub server_id: Option<String>,
}

impl SaleTransaction {
    /// Builds a completed sale header, computing the total so that
    /// `total = subtotal - discount + tax` holds by construction.
    pub fn new(
        id: impl Into<String>,
        subtotal: Money,
        discount: Money,
        tax: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        SaleTransaction {
            id: id.into(),
            subtotal,
            tax,
            discount,
            total: subtotal - discount + tax,
            status: TransactionStatus::Completed,
            created_at,
            updated_at: created_at,
            sync_status: SyncStatus::Pending,
            server_id: None,
        }
    }

    /// Checks the pricing invariant on a row read back from storage.
    pub fn total_is_consistent(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax
    }
}

/// A frozen snapshot of a sold line; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub qty: i64,
    /// Unit price frozen from the cart line, not re-read from the product.
    pub price: Money,
    pub sync_status: SyncStatus,
}

impl TransactionItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.times(self.qty)
    }
}

/// A payment attempt against a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentAttempt {
    pub id: String,
    pub transaction_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Provider-side reference (QRIS order id, terminal auth code).
    pub provider_ref: Option<String>,
    pub sync_status: SyncStatus,
}

// =============================================================================
// Sync Cursor
// =============================================================================

/// Per-device, per-tenant high-watermark describing which remote rows have
/// already been pulled.
///
/// Watermarks are monotonic: they only move forward, and only after a full
/// pull batch has been durably applied locally. The single exception is
/// explicit device re-provisioning, which resets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub last_product_updated_at: Option<DateTime<Utc>>,
    pub last_tx_updated_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    /// Advances the product watermark; a candidate older than the current
    /// value is ignored.
    pub fn advance_products(&mut self, candidate: DateTime<Utc>) {
        if self.last_product_updated_at.map_or(true, |c| candidate > c) {
            self.last_product_updated_at = Some(candidate);
        }
    }

    /// Advances the transaction watermark, monotonic like
    /// [`advance_products`](Self::advance_products).
    pub fn advance_transactions(&mut self, candidate: DateTime<Utc>) {
        if self.last_tx_updated_at.map_or(true, |c| candidate > c) {
            self.last_tx_updated_at = Some(candidate);
        }
    }

    /// Rewinds both watermarks to the beginning of time. Only valid during
    /// device re-provisioning.
    pub fn reset(&mut self) {
        self.last_product_updated_at = None;
        self.last_tx_updated_at = None;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
