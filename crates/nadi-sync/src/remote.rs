//! # Remote Backend Contract
//!
//! The row-shape contract with the remote multi-tenant store. The engine
//! only needs to push pending rows and pull rows newer than a watermark;
//! everything about transport, authentication, and the backend schema's
//! ownership is the external collaborator's concern.
//!
//! ## Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  remote table          DTO here              direction              │
//! │  ─────────────         ────────────────      ─────────              │
//! │  products              RemoteProduct         push + pull            │
//! │  (stock counter)       RemoteStockDelta      push (increments)      │
//! │  transactions          RemoteTransaction     push + pull            │
//! │  transaction_items     RemoteTransactionItem rides with its header  │
//! │  payment_intents       RemotePaymentIntent   rides with its header  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary columns are raw integer minor units on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::error::SyncResult;
use nadi_core::{PaymentStatus, TransactionStatus};

/// Boxed future type for the backend trait, so engines generic over a
/// backend stay spawnable on multi-threaded runtimes.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// =============================================================================
// Row Shapes
// =============================================================================

/// A row of the remote `products` table.
///
/// `stock` is the local counter at push time; the backend applies it as
/// the starting baseline when it first sees the product and otherwise
/// maintains the counter from [`RemoteStockDelta`] increments, never from
/// product upserts (stock is not last-writer-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// A stock increment for the remote counter (CRDT-style merge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStockDelta {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// A row of the remote `transactions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTransaction {
    pub id: String,
    pub tenant_id: String,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of the remote `transaction_items` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTransactionItem {
    pub id: String,
    pub transaction_id: String,
    pub product_id: String,
    pub qty: i64,
    pub price: i64,
    pub subtotal: i64,
}

/// A row of the remote `payment_intents` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePaymentIntent {
    pub id: String,
    pub tenant_id: String,
    pub transaction_id: String,
    pub amount: i64,
    pub provider: Option<String>,
    pub provider_order_id: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// A transaction with the rows that must land with it. Pushed and pulled
/// as one unit so the backend never sees an orphaned item or payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBundle {
    pub transaction: RemoteTransaction,
    pub items: Vec<RemoteTransactionItem>,
    pub payments: Vec<RemotePaymentIntent>,
}

// =============================================================================
// Acknowledgements
// =============================================================================

/// Per-row outcome of a push call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowAck {
    /// The local row id this ack refers to.
    pub id: String,
    /// True on 2xx-equivalent acceptance.
    pub accepted: bool,
    /// For rejections: whether a later retry could succeed.
    pub retryable: bool,
    /// Backend-assigned id for the accepted row, when it differs from
    /// the local id.
    pub server_id: Option<String>,
    /// Rejection detail.
    pub error: Option<String>,
}

impl RowAck {
    /// An acceptance keeping the local id.
    pub fn accepted(id: impl Into<String>) -> Self {
        RowAck {
            id: id.into(),
            accepted: true,
            retryable: false,
            server_id: None,
            error: None,
        }
    }

    /// A rejection.
    pub fn rejected(id: impl Into<String>, retryable: bool, error: impl Into<String>) -> Self {
        RowAck {
            id: id.into(),
            accepted: false,
            retryable,
            server_id: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// The remote store, as seen by the sync engine.
///
/// Implementations own transport, auth, and retry-at-the-wire concerns.
/// A whole-call failure (`Err`) means "nothing was durably accepted,
/// retry later"; per-row outcomes ride in the acks. Push calls arrive in
/// foreign-key dependency order: products, then stock deltas, then
/// transaction bundles.
pub trait RemoteBackend: Send {
    /// Upserts products, keyed by id within the tenant.
    fn push_products<'a>(
        &'a mut self,
        tenant_id: &'a str,
        rows: Vec<RemoteProduct>,
    ) -> BoxFuture<'a, SyncResult<Vec<RowAck>>>;

    /// Applies stock increments to the remote counters.
    fn push_stock_deltas<'a>(
        &'a mut self,
        tenant_id: &'a str,
        rows: Vec<RemoteStockDelta>,
    ) -> BoxFuture<'a, SyncResult<Vec<RowAck>>>;

    /// Inserts transactions with their items and payment intents. Acks
    /// are per bundle, keyed by the transaction id.
    fn push_transactions<'a>(
        &'a mut self,
        tenant_id: &'a str,
        bundles: Vec<TransactionBundle>,
    ) -> BoxFuture<'a, SyncResult<Vec<RowAck>>>;

    /// Products with `updated_at > since` (everything when `None`),
    /// oldest first.
    fn pull_products<'a>(
        &'a mut self,
        tenant_id: &'a str,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'a, SyncResult<Vec<RemoteProduct>>>;

    /// Transactions with `updated_at > since` (everything when `None`),
    /// oldest first, bundled with their items and payments.
    fn pull_transactions<'a>(
        &'a mut self,
        tenant_id: &'a str,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'a, SyncResult<Vec<TransactionBundle>>>;
}
