//! # Repositories
//!
//! One repository per entity family, each a thin handle over the shared
//! pool. Multi-row invariants (sale commit, stock adjust + ledger row)
//! run inside a single SQLite transaction owned by the repository method;
//! callers never compose partial writes from outside.

pub mod cart;
pub mod inventory;
pub mod meta;
pub mod product;
pub mod transaction;

use uuid::Uuid;

/// Generates a new row id.
///
/// UUIDv7 ids sort by creation time, so insertion order falls out of a
/// plain `ORDER BY id` and sync batches ship in a deterministic order.
pub fn new_row_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_ids_are_unique_v7() {
        let a = new_row_id();
        let b = new_row_id();
        assert_ne!(a, b);
        assert_eq!(
            Uuid::parse_str(&a).unwrap().get_version_num(),
            7,
            "row ids must be UUIDv7"
        );
    }

    #[test]
    fn test_row_ids_sort_across_time() {
        let a = new_row_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_row_id();
        assert!(a < b, "ids minted later must sort later");
    }
}
