//! # Sync Engine
//!
//! Drives the push/pull reconciliation cycle against the remote backend.
//!
//! ## The Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Idle → Pushing → Pulling → Idle                     │
//! │                                                                     │
//! │  PUSH (FK dependency order)                                         │
//! │    1. products with sync_status = pending                           │
//! │    2. stock delta ledger rows                                       │
//! │    3. transaction bundles (header + items + payment intents)        │
//! │       accepted → synced (+ server_id)                               │
//! │       rejected → attempts += 1, failed once the budget is spent     │
//! │       network error → rows STAY pending, phase backs off            │
//! │                                                                     │
//! │  PULL (bounded by the cursor watermarks)                            │
//! │    products: last-writer-wins by updated_at; stock rebased by       │
//! │              replaying pending local deltas on the pulled baseline  │
//! │    transactions: append-only; local rows are never overwritten      │
//! │                                                                     │
//! │    The whole pull batch AND the cursor advance commit in ONE        │
//! │    local transaction: the cursor never moves past rows that did     │
//! │    not durably apply.                                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Push and pull are independently retryable; a failed push does not
//! block the pull half of the cycle on the next run, and neither ever
//! blocks foreground cart/checkout/inventory work.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{SyncConfig, SyncMode};
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{remote_product_wins, replay_stock};
use crate::remote::{
    RemoteBackend, RemotePaymentIntent, RemoteProduct, RemoteStockDelta, RemoteTransaction,
    RemoteTransactionItem, RowAck, TransactionBundle,
};
use nadi_core::{PaymentMethod, SyncStatus};
use nadi_store::Store;

// =============================================================================
// Phase / Outcome
// =============================================================================

/// Where the engine currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Pushing,
    Pulling,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub pushed_products: usize,
    pub pushed_deltas: usize,
    pub pushed_transactions: usize,
    pub pulled_products: usize,
    pub pulled_transactions: usize,
}

// =============================================================================
// Engine
// =============================================================================

/// The reconciliation engine. Generic over the remote backend so tests
/// drive it against an in-memory fake.
pub struct SyncEngine<R: RemoteBackend> {
    store: Store,
    remote: R,
    config: SyncConfig,
    phase: SyncPhase,
}

impl<R: RemoteBackend> SyncEngine<R> {
    /// Creates an engine over the given store, backend, and config.
    pub fn new(store: Store, remote: R, config: SyncConfig) -> Self {
        SyncEngine {
            store,
            remote,
            config,
            phase: SyncPhase::Idle,
        }
    }

    /// Current phase (for status displays).
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The remote backend (tests inspect fake state through this).
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Runs one full push + pull cycle.
    ///
    /// A transient network failure retries the current phase with
    /// exponential backoff; once the backoff budget is spent the error
    /// propagates and every unacknowledged row is still `pending` for the
    /// next cycle.
    pub async fn run_cycle(&mut self) -> SyncResult<SyncOutcome> {
        if !self.config.is_sync_enabled() {
            debug!("Sync is disabled (mode: offline)");
            return Ok(SyncOutcome::default());
        }

        let mut outcome = SyncOutcome::default();
        outcome.merge(self.push().await?);
        outcome.merge(self.pull().await?);

        info!(
            pushed_products = outcome.pushed_products,
            pushed_deltas = outcome.pushed_deltas,
            pushed_transactions = outcome.pushed_transactions,
            pulled_products = outcome.pulled_products,
            pulled_transactions = outcome.pulled_transactions,
            "Sync cycle complete"
        );

        Ok(outcome)
    }

    /// Runs the push half of the cycle on its own. Retryable
    /// independently of pull.
    pub async fn push(&mut self) -> SyncResult<SyncOutcome> {
        self.phase = SyncPhase::Pushing;
        let result = self.with_backoff(Op::Push).await;
        self.phase = SyncPhase::Idle;
        result
    }

    /// Runs the pull half of the cycle on its own. Retryable
    /// independently of push.
    pub async fn pull(&mut self) -> SyncResult<SyncOutcome> {
        self.phase = SyncPhase::Pulling;
        let result = self.with_backoff(Op::Pull).await;
        self.phase = SyncPhase::Idle;
        result
    }

    /// Retries one phase on transient network errors, sleeping per the
    /// configured exponential backoff.
    async fn with_backoff(&mut self, op: Op) -> SyncResult<SyncOutcome> {
        let mut policy = self.backoff_policy();

        loop {
            let result = match op {
                Op::Push => self.push_once().await,
                Op::Pull => self.pull_once().await,
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() => match policy.next_backoff() {
                    Some(delay) => {
                        warn!(?op, error = %e, ?delay, "Transient sync error, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(?op, error = %e, "Backoff budget spent, yielding until next cycle");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.sync.initial_backoff_ms),
            max_interval: Duration::from_secs(self.config.sync.max_backoff_secs),
            max_elapsed_time: Some(Duration::from_secs(self.config.sync.max_backoff_secs * 2)),
            ..ExponentialBackoff::default()
        }
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Pushes every pending row, in foreign-key dependency order.
    async fn push_once(&mut self) -> SyncResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let batch = self.config.sync.batch_size as u32;
        let tenant = self.config.tenant.id.clone();
        let max_attempts = self.config.sync.max_retries;

        // --- products -------------------------------------------------------
        let pending = self.store.products().pending_sync(batch).await?;
        if !pending.is_empty() {
            let mut rows = Vec::with_capacity(pending.len());
            for product in &pending {
                let stock = self.store.inventory().stock_of(&product.id).await?;
                let pending_deltas = self.store.inventory().pending_delta_sum(&product.id).await?;

                rows.push(RemoteProduct {
                    id: product.id.clone(),
                    tenant_id: tenant.clone(),
                    name: product.name.clone(),
                    price: product.price.minor(),
                    // Baseline net of this device's unpushed deltas: they
                    // follow as increments, so including them here would
                    // count each movement twice on first insert.
                    stock: stock - pending_deltas,
                    is_active: product.is_active,
                    updated_at: product.updated_at,
                });
            }

            debug!(count = rows.len(), "Pushing products");
            let acks = self.remote.push_products(&tenant, rows).await?;
            for ack in &acks {
                if ack.accepted {
                    self.store.products().mark_synced(&ack.id).await?;
                    outcome.pushed_products += 1;
                } else {
                    self.record_product_rejection(ack, max_attempts).await?;
                }
            }
        }

        // --- stock deltas ---------------------------------------------------
        let pending = self.store.inventory().pending_deltas(batch).await?;
        if !pending.is_empty() {
            let rows: Vec<RemoteStockDelta> = pending
                .iter()
                .map(|d| RemoteStockDelta {
                    id: d.id.clone(),
                    tenant_id: tenant.clone(),
                    product_id: d.product_id.clone(),
                    delta: d.delta,
                    occurred_at: d.created_at,
                })
                .collect();

            debug!(count = rows.len(), "Pushing stock deltas");
            let acks = self.remote.push_stock_deltas(&tenant, rows).await?;
            for ack in &acks {
                if ack.accepted {
                    self.store.inventory().mark_delta_synced(&ack.id).await?;
                    outcome.pushed_deltas += 1;
                } else {
                    let budget = if ack.retryable { max_attempts } else { 1 };
                    self.store
                        .inventory()
                        .record_delta_push_rejection(&ack.id, budget)
                        .await?;
                    warn!(id = %ack.id, error = ?ack.error, "Stock delta push rejected");
                }
            }
        }

        // --- transactions (items and payments ride with the header) ---------
        let pending = self.store.transactions().pending_sync(batch).await?;
        if !pending.is_empty() {
            let mut bundles = Vec::with_capacity(pending.len());
            for sale in &pending {
                bundles.push(self.bundle_for_push(sale, &tenant).await?);
            }

            debug!(count = bundles.len(), "Pushing transactions");
            let acks = self.remote.push_transactions(&tenant, bundles).await?;
            for ack in &acks {
                if ack.accepted {
                    let server_id = ack.server_id.as_deref().unwrap_or(&ack.id);
                    self.store.transactions().mark_synced(&ack.id, server_id).await?;
                    outcome.pushed_transactions += 1;
                } else {
                    let budget = if ack.retryable { max_attempts } else { 1 };
                    self.store
                        .transactions()
                        .record_push_rejection(&ack.id, budget)
                        .await?;
                    warn!(id = %ack.id, error = ?ack.error, "Transaction push rejected");
                }
            }
        }

        Ok(outcome)
    }

    async fn record_product_rejection(&self, ack: &RowAck, max_attempts: u32) -> SyncResult<()> {
        let budget = if ack.retryable { max_attempts } else { 1 };
        self.store
            .products()
            .record_push_rejection(&ack.id, budget)
            .await?;
        warn!(id = %ack.id, error = ?ack.error, "Product push rejected");
        Ok(())
    }

    async fn bundle_for_push(
        &self,
        sale: &nadi_core::SaleTransaction,
        tenant: &str,
    ) -> SyncResult<TransactionBundle> {
        let items = self.store.transactions().items(&sale.id).await?;
        let payments = self.store.transactions().payments(&sale.id).await?;

        Ok(TransactionBundle {
            transaction: RemoteTransaction {
                id: sale.id.clone(),
                tenant_id: tenant.to_string(),
                subtotal: sale.subtotal.minor(),
                tax: sale.tax.minor(),
                discount: sale.discount.minor(),
                total: sale.total.minor(),
                status: sale.status,
                created_at: sale.created_at,
                updated_at: sale.updated_at,
            },
            items: items
                .iter()
                .map(|item| RemoteTransactionItem {
                    id: item.id.clone(),
                    transaction_id: item.transaction_id.clone(),
                    product_id: item.product_id.clone(),
                    qty: item.qty,
                    price: item.price.minor(),
                    subtotal: item.line_total().minor(),
                })
                .collect(),
            payments: payments
                .iter()
                .map(|payment| RemotePaymentIntent {
                    id: payment.id.clone(),
                    tenant_id: tenant.to_string(),
                    transaction_id: payment.transaction_id.clone(),
                    amount: sale.total.minor(),
                    provider: Some(payment.method.to_string()),
                    provider_order_id: payment.provider_ref.clone(),
                    status: payment.status,
                    created_at: sale.created_at,
                })
                .collect(),
        })
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Pulls remote rows past the cursor watermarks and applies the whole
    /// batch, cursor advance included, in one local transaction.
    async fn pull_once(&mut self) -> SyncResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        let tenant = self.config.tenant.id.clone();

        let cursor = self.store.meta().load_cursor().await?;

        let products = self
            .remote
            .pull_products(&tenant, cursor.last_product_updated_at)
            .await?;
        let bundles = self
            .remote
            .pull_transactions(&tenant, cursor.last_tx_updated_at)
            .await?;

        if products.is_empty() && bundles.is_empty() {
            debug!("Nothing to pull");
            return Ok(outcome);
        }

        let mut new_cursor = cursor;
        let now = Utc::now();
        let mut tx = self.store.pool().begin().await?;

        for remote_product in &products {
            self.apply_remote_product(&mut tx, remote_product, now).await?;
            new_cursor.advance_products(remote_product.updated_at);
            outcome.pulled_products += 1;
        }

        for bundle in &bundles {
            if self.apply_remote_transaction(&mut tx, bundle).await? {
                outcome.pulled_transactions += 1;
            }
            new_cursor.advance_transactions(bundle.transaction.updated_at);
        }

        // Cursor and batch commit together: a crash before this point
        // re-pulls the same rows, never skips them.
        save_cursor_in_tx(&mut tx, &new_cursor).await?;

        tx.commit().await.map_err(SyncError::from)?;

        Ok(outcome)
    }

    /// Applies one pulled product row: LWW for the metadata, delta replay
    /// for the stock counter.
    async fn apply_remote_product(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        remote: &RemoteProduct,
        now: DateTime<Utc>,
    ) -> SyncResult<()> {
        let local: Option<(DateTime<Utc>, SyncStatus)> =
            sqlx::query_as("SELECT updated_at, sync_status FROM products WHERE id = ?1")
                .bind(&remote.id)
                .fetch_optional(&mut **tx)
                .await?;

        match local {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO products (id, name, price, is_active, created_at, updated_at, sync_status)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?5, 'synced')
                    "#,
                )
                .bind(&remote.id)
                .bind(&remote.name)
                .bind(remote.price)
                .bind(remote.is_active)
                .bind(remote.updated_at)
                .execute(&mut **tx)
                .await?;

                debug!(id = %remote.id, "Pulled new product");
            }
            Some((local_updated_at, local_sync)) => {
                if remote_product_wins(local_updated_at, remote.updated_at) {
                    if local_sync == SyncStatus::Pending {
                        // A concurrent local edit loses to a later remote
                        // write. Auditable, never user-facing.
                        let conflict = SyncError::Conflict {
                            entity_type: "product".into(),
                            entity_id: remote.id.clone(),
                            detail: format!(
                                "local {} vs remote {}: remote write wins",
                                local_updated_at, remote.updated_at
                            ),
                        };
                        warn!(resolution = %conflict, "Conflict resolved");
                    }

                    sqlx::query(
                        r#"
                        UPDATE products SET
                            name = ?2,
                            price = ?3,
                            is_active = ?4,
                            updated_at = ?5,
                            sync_status = 'synced',
                            sync_attempts = 0
                        WHERE id = ?1
                        "#,
                    )
                    .bind(&remote.id)
                    .bind(&remote.name)
                    .bind(remote.price)
                    .bind(remote.is_active)
                    .bind(remote.updated_at)
                    .execute(&mut **tx)
                    .await?;
                } else if local_sync == SyncStatus::Pending {
                    let conflict = SyncError::Conflict {
                        entity_type: "product".into(),
                        entity_id: remote.id.clone(),
                        detail: "local write is newer, push will carry it".into(),
                    };
                    warn!(resolution = %conflict, "Conflict resolved");
                } else {
                    debug!(id = %remote.id, "Skipping stale remote product row");
                }
            }
        }

        // Stock is NOT last-writer-wins: rebase the pulled baseline by
        // replaying the deltas the remote has not accepted yet.
        let pending_sum: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(delta) FROM inventory_deltas WHERE product_id = ?1 AND sync_status = 'pending'",
        )
        .bind(&remote.id)
        .fetch_one(&mut **tx)
        .await?;

        let reconciled = replay_stock(remote.stock, pending_sum.unwrap_or(0));

        sqlx::query(
            r#"
            INSERT INTO inventory_cache (product_id, stock, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (product_id) DO UPDATE SET
                stock = excluded.stock,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&remote.id)
        .bind(reconciled)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Inserts a pulled transaction bundle unless it is already known.
    ///
    /// Local transactions are the device's own source of truth and are
    /// never overwritten by pull. Returns true when the bundle was
    /// inserted.
    async fn apply_remote_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        bundle: &TransactionBundle,
    ) -> SyncResult<bool> {
        let remote = &bundle.transaction;

        // Known either as a local row (same id) or as a previously pushed
        // one (server_id).
        let known: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM transactions_local WHERE id = ?1 OR server_id = ?1 LIMIT 1",
        )
        .bind(&remote.id)
        .fetch_optional(&mut **tx)
        .await?;

        if known.is_some() {
            debug!(id = %remote.id, "Skipping already-known transaction");
            return Ok(false);
        }

        // Items referencing products this device has never seen cannot
        // satisfy the foreign keys; the remote store stays authoritative
        // for that history.
        for item in &bundle.items {
            let product_known: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
                    .bind(&item.product_id)
                    .fetch_optional(&mut **tx)
                    .await?;
            if product_known.is_none() {
                warn!(
                    transaction_id = %remote.id,
                    product_id = %item.product_id,
                    "Skipping pulled transaction referencing unknown product"
                );
                return Ok(false);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO transactions_local (
                id, subtotal, tax, discount, total, status,
                created_at, updated_at, sync_status, server_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'synced', ?1)
            "#,
        )
        .bind(&remote.id)
        .bind(remote.subtotal)
        .bind(remote.tax)
        .bind(remote.discount)
        .bind(remote.total)
        .bind(remote.status)
        .bind(remote.created_at)
        .bind(remote.updated_at)
        .execute(&mut **tx)
        .await?;

        for item in &bundle.items {
            sqlx::query(
                r#"
                INSERT INTO transaction_items_local (
                    id, transaction_id, product_id, qty, price, sync_status
                ) VALUES (?1, ?2, ?3, ?4, ?5, 'synced')
                "#,
            )
            .bind(&item.id)
            .bind(&remote.id)
            .bind(&item.product_id)
            .bind(item.qty)
            .bind(item.price)
            .execute(&mut **tx)
            .await?;
        }

        for payment in &bundle.payments {
            let method = payment
                .provider
                .as_deref()
                .and_then(|p| PaymentMethod::from_str(p).ok())
                .unwrap_or(PaymentMethod::Cash);

            sqlx::query(
                r#"
                INSERT INTO payment_attempts_local (
                    id, transaction_id, method, status, provider_ref, sync_status
                ) VALUES (?1, ?2, ?3, ?4, ?5, 'synced')
                "#,
            )
            .bind(&payment.id)
            .bind(&remote.id)
            .bind(method)
            .bind(payment.status)
            .bind(&payment.provider_order_id)
            .execute(&mut **tx)
            .await?;
        }

        debug!(id = %remote.id, "Pulled foreign transaction");
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Push,
    Pull,
}

impl SyncOutcome {
    fn merge(&mut self, other: SyncOutcome) {
        self.pushed_products += other.pushed_products;
        self.pushed_deltas += other.pushed_deltas;
        self.pushed_transactions += other.pushed_transactions;
        self.pulled_products += other.pulled_products;
        self.pulled_transactions += other.pulled_transactions;
    }
}

/// Writes the cursor keys inside the pull batch transaction.
async fn save_cursor_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    cursor: &nadi_core::SyncCursor,
) -> SyncResult<()> {
    use nadi_store::repository::meta::{KEY_CURSOR_PRODUCTS, KEY_CURSOR_TRANSACTIONS};

    if let Some(ts) = cursor.last_product_updated_at {
        sqlx::query("INSERT OR REPLACE INTO local_meta (key, value) VALUES (?1, ?2)")
            .bind(KEY_CURSOR_PRODUCTS)
            .bind(ts.to_rfc3339())
            .execute(&mut **tx)
            .await?;
    }
    if let Some(ts) = cursor.last_tx_updated_at {
        sqlx::query("INSERT OR REPLACE INTO local_meta (key, value) VALUES (?1, ?2)")
            .bind(KEY_CURSOR_TRANSACTIONS)
            .bind(ts.to_rfc3339())
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

// =============================================================================
// Background Runner
// =============================================================================

/// Drives an engine on the configured poll interval until shut down.
pub struct SyncRunner {
    shutdown_tx: mpsc::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl SyncRunner {
    /// Spawns the background loop. In `Manual` mode the loop idles and
    /// only reacts to shutdown; in `Offline` mode it exits immediately.
    pub fn spawn<R: RemoteBackend + Sync + 'static>(engine: SyncEngine<R>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let mut engine = engine;

            if !engine.config().is_sync_enabled() {
                info!("Sync runner not starting (mode: offline)");
                return;
            }

            let period = Duration::from_secs(engine.config().sync.poll_interval_secs);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            info!(
                device_id = %engine.config().device_id(),
                mode = %engine.config().mode(),
                poll_interval_secs = engine.config().sync.poll_interval_secs,
                "Sync runner started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if engine.config().mode() != SyncMode::Auto {
                            continue;
                        }
                        match engine.run_cycle().await {
                            Ok(outcome) => debug!(?outcome, "Cycle finished"),
                            Err(e) => error!(error = %e, "Sync cycle failed"),
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        info!("Sync runner shutting down");
                        break;
                    }
                }
            }
        });

        SyncRunner { shutdown_tx, handle }
    }

    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}
