//! # Reconciliation Policies
//!
//! The pure conflict-resolution rules of the protocol, kept free of I/O
//! so they can be tested exhaustively.
//!
//! ## The Two Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  PRODUCTS: last-writer-wins by updated_at                           │
//! │                                                                     │
//! │     remote.updated_at >  local.updated_at  → remote wins, applied   │
//! │     remote.updated_at <= local.updated_at  → local wins, skipped    │
//! │                                              (a pending local edit  │
//! │                                               pushes next cycle)    │
//! │                                                                     │
//! │  STOCK: NOT last-writer-wins                                        │
//! │                                                                     │
//! │     reconciled = max(0, remote_baseline + Σ pending local deltas)   │
//! │                                                                     │
//! │     The pulled baseline already contains every delta the remote     │
//! │     accepted (ours and other devices'). Replaying only the          │
//! │     *pending* local deltas on top folds in concurrent sales from    │
//! │     sibling terminals without counting anything twice.             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

/// Last-writer-wins for product metadata: true when the pulled row should
/// overwrite the local one.
///
/// Ties go to the local row; an equal timestamp means the row is already
/// the same write.
pub fn remote_product_wins(
    local_updated_at: DateTime<Utc>,
    remote_updated_at: DateTime<Utc>,
) -> bool {
    remote_updated_at > local_updated_at
}

/// Rebases the stock counter on a pulled remote baseline by replaying the
/// local deltas the remote has not seen yet. Clamped at zero like every
/// other stock write.
pub fn replay_stock(remote_baseline: i64, pending_local_delta_sum: i64) -> i64 {
    (remote_baseline + pending_local_delta_sum).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lww_later_remote_wins() {
        let local = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let remote = Utc.with_ymd_and_hms(2026, 2, 1, 11, 0, 0).unwrap();

        assert!(remote_product_wins(local, remote));
        assert!(!remote_product_wins(remote, local));
    }

    #[test]
    fn test_lww_tie_keeps_local() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        assert!(!remote_product_wins(ts, ts));
    }

    #[test]
    fn test_replay_stock_folds_in_concurrent_sales() {
        // Local stock 10, local sale of 2 still pending, remote baseline 8
        // (another device sold 2): the answer is 6 -- not 8 (clobbering
        // the local sale) and not 10-2 (computed against stale state).
        assert_eq!(replay_stock(8, -2), 6);
    }

    #[test]
    fn test_replay_stock_clamps_at_zero() {
        assert_eq!(replay_stock(1, -5), 0);
        assert_eq!(replay_stock(0, -2), 0);
    }

    #[test]
    fn test_replay_stock_with_restock_pending() {
        assert_eq!(replay_stock(3, 10), 13);
        assert_eq!(replay_stock(3, 0), 3);
    }
}
