//! Restart-survival tests against a file-backed store.
//!
//! The in-memory unit tests cover query semantics; these cover the part
//! that only shows up with a real file: rows written before a process
//! restart are still there after, and re-applying the schema on reopen
//! does not disturb them.

use nadi_core::{Money, SyncStatus};
use nadi_store::{Store, StoreConfig};

#[tokio::test]
async fn reopened_store_keeps_committed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nadi_pos.db");

    let product_id = {
        let store = Store::open(StoreConfig::new(&db_path)).await.unwrap();
        let product = store
            .products()
            .insert("Kopi", Money::from_minor(18_000), 10)
            .await
            .unwrap();
        store
            .inventory()
            .adjust_stock(&product.id, -2, "sale")
            .await
            .unwrap();
        store.close().await;
        product.id
    };

    // "Restart": a fresh pool over the same file, schema re-applied.
    let store = Store::open(StoreConfig::new(&db_path)).await.unwrap();

    let product = store
        .products()
        .get_with_stock(&product_id)
        .await
        .unwrap()
        .expect("product must survive restart");
    assert_eq!(product.name, "Kopi");
    assert_eq!(product.stock, 8);
    assert_eq!(product.sync_status, SyncStatus::Pending);

    // The delta ledger survived too, so sync can still replay it.
    assert_eq!(
        store
            .inventory()
            .pending_delta_sum(&product_id)
            .await
            .unwrap(),
        -2
    );
}

#[tokio::test]
async fn cart_draft_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nadi_pos.db");

    let (cart_id, product_id) = {
        let store = Store::open(StoreConfig::new(&db_path)).await.unwrap();
        let product = store
            .products()
            .insert("Teh", Money::from_minor(5_000), 6)
            .await
            .unwrap();
        let cart = store.carts().get_or_create_active().await.unwrap();
        store.carts().add_item(&cart.id, &product.id, 2).await.unwrap();
        store.close().await;
        (cart.id, product.id)
    };

    let store = Store::open(StoreConfig::new(&db_path)).await.unwrap();

    let active = store.carts().active_cart().await.unwrap().unwrap();
    assert_eq!(active.id, cart_id);

    let lines = store.carts().lines(&cart_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, product_id);
    assert_eq!(lines[0].qty, 2);
    assert_eq!(lines[0].price, Money::from_minor(5_000));
}
