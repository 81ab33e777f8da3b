//! Cart behaviour under success, failure, overlap and identity changes.

mod common;

use common::{eventually, Harness};
use std::sync::Arc;
use std::time::Duration;
use storefront_client::remote::StoreOp;
use storefront_client::{
    CartManager, ClientError, ClientEvent, MemoryRemoteStore, MutationKind, MutationOutcome,
    NoOpEmitter, RemoteStore,
};
use storefront_core::{CartTotals, EntityId, Identity, LineId, Money, Role};
use tokio::sync::watch;

fn line_ids(lines: &[storefront_core::CartLine]) -> Vec<LineId> {
    lines.iter().map(|l| l.line_id.clone()).collect()
}

#[tokio::test]
async fn test_anonymous_add_is_unauthorized() {
    let h = Harness::new().await;
    let product = h.product("Backpack", 999).await;

    let err = h.client.cart().add_to_cart(&product).await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(h.client.cart().item_count().await, 0);
    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn test_first_add_uses_exact_price() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let product = h.product("Backpack", 999).await;
    h.shop_as(&user).await;

    let outcome = h.client.cart().add_to_cart(&product).await.unwrap();

    let line_id = match outcome {
        MutationOutcome::Confirmed { line_id } => line_id,
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert!(!line_id.is_temporary());
    let totals = h.client.cart().totals().await;
    assert_eq!(totals.item_count, 1);
    assert_eq!(totals.total_price, Money::from_cents(999));
    assert_eq!(h.client.cart().view().await.lines[0].line_id, line_id);
}

#[tokio::test]
async fn test_same_product_twice_is_one_line() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let product = h.product("Backpack", 999).await;
    h.shop_as(&user).await;

    h.client.cart().add_to_cart(&product).await.unwrap();
    h.client.cart().add_to_cart(&product).await.unwrap();

    let view = h.client.cart().view().await;
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].quantity, 2);
    assert_eq!(view.totals.total_price, Money::from_cents(1998));

    let remote = h.store.cart_lines_of(&user.id).await;
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].quantity, 2);
}

#[tokio::test]
async fn test_failed_create_removes_temporary_line() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let kept = h.product("Mug", 500).await;
    let product = h.product("Backpack", 999).await;
    h.store.insert_cart_line(&user.id, &kept.id, 2).await;
    h.shop_as(&user).await;
    let before = h.client.cart().view().await;

    h.store.fail_next(StoreOp::CreateCartLine).await;
    let outcome = h.client.cart().add_to_cart(&product).await.unwrap();

    assert!(outcome.is_rolled_back());
    let after = h.client.cart().view().await;
    assert_eq!(after.lines, before.lines);
    assert_eq!(
        after.totals,
        CartTotals {
            line_count: 1,
            item_count: 2,
            total_price: Money::from_cents(1000),
        }
    );

    let diagnostics = h.client.cart().diagnostics().await;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].operation, MutationKind::Create);
    assert_eq!(h.emitter.diagnostics(), diagnostics);
}

#[tokio::test]
async fn test_failed_increment_restores_quantity() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let product = h.product("Backpack", 999).await;
    h.store.insert_cart_line(&user.id, &product.id, 3).await;
    h.shop_as(&user).await;

    h.store.fail_next(StoreOp::UpdateCartLine).await;
    let outcome = h.client.cart().add_to_cart(&product).await.unwrap();

    assert!(outcome.is_rolled_back());
    let totals = h.client.cart().totals().await;
    assert_eq!(totals.item_count, 3);
    assert_eq!(totals.total_price, Money::from_cents(2997));
    assert_eq!(h.store.cart_lines_of(&user.id).await[0].quantity, 3);
}

#[tokio::test]
async fn test_failed_remove_restores_position() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    for (title, qty) in [("A", 1), ("B", 4), ("C", 2)] {
        let product = h.product(title, 100).await;
        h.store.insert_cart_line(&user.id, &product.id, qty).await;
    }
    h.shop_as(&user).await;
    let before = h.client.cart().view().await;
    let middle = before.lines[1].line_id.clone();

    h.store.fail_next(StoreOp::DeleteCartLine).await;
    let outcome = h.client.cart().remove_from_cart(&middle).await.unwrap();

    assert!(outcome.is_rolled_back());
    let after = h.client.cart().view().await;
    assert_eq!(line_ids(&after.lines), line_ids(&before.lines));
    assert_eq!(after.lines[1].quantity, 4);
    assert_eq!(after.totals, before.totals);
}

#[tokio::test]
async fn test_remove_and_update_quantity() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let a = h.product("A", 250).await;
    let b = h.product("B", 100).await;
    let line_a = h.store.insert_cart_line(&user.id, &a.id, 1).await;
    let line_b = h.store.insert_cart_line(&user.id, &b.id, 1).await;
    h.shop_as(&user).await;
    let cart = h.client.cart();

    let outcome = cart
        .update_quantity(&LineId::Remote(line_a.clone()), 4)
        .await
        .unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(cart.total_price().await, Money::from_cents(1100));

    h.store.fail_next(StoreOp::UpdateCartLine).await;
    let outcome = cart
        .update_quantity(&LineId::Remote(line_a.clone()), 9)
        .await
        .unwrap();
    assert!(outcome.is_rolled_back());
    assert_eq!(cart.item_count().await, 5);

    // zero goes through the remove path
    cart.update_quantity(&LineId::Remote(line_b), 0)
        .await
        .unwrap();
    assert_eq!(cart.view().await.lines.len(), 1);
    assert_eq!(h.store.cart_lines_of(&user.id).await.len(), 1);

    cart.remove_from_cart(&LineId::Remote(line_a)).await.unwrap();
    assert_eq!(cart.totals().await, CartTotals::default());
    assert!(h.store.cart_lines_of(&user.id).await.is_empty());
}

#[tokio::test]
async fn test_cart_changed_emitted_after_every_change() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let product = h.product("Backpack", 999).await;
    h.shop_as(&user).await;
    h.emitter.take();

    h.store.fail_next(StoreOp::CreateCartLine).await;
    h.client.cart().add_to_cart(&product).await.unwrap();

    let counts: Vec<i64> = h
        .emitter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::CartChanged(t) => Some(t.item_count),
            _ => None,
        })
        .collect();
    // optimistic apply, then rollback
    assert_eq!(counts, vec![1, 0]);
}

#[tokio::test]
async fn test_load_drops_lines_with_deleted_products() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let kept = h.product("Mug", 500).await;
    let gone = h.product("Lamp", 4_000).await;
    h.store.insert_cart_line(&user.id, &kept.id, 1).await;
    h.store.insert_cart_line(&user.id, &gone.id, 1).await;
    h.store.delete_product(&gone.id).await.unwrap();

    h.login(&user).await;
    let totals = h.client.cart().load_cart().await.unwrap();

    assert_eq!(totals.line_count, 1);
    assert_eq!(totals.total_price, Money::from_cents(500));
    // the dangling line stays in the store
    assert_eq!(h.store.cart_lines_of(&user.id).await.len(), 2);
}

#[tokio::test]
async fn test_load_with_huge_price_saturates_total() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let huge = h.product("Yacht", i64::MAX / 2 + 1).await;
    let mug = h.product("Mug", 500).await;
    h.store.insert_cart_line(&user.id, &huge.id, 2).await;
    h.store.insert_cart_line(&user.id, &mug.id, 1).await;

    h.login(&user).await;
    let totals = h.client.cart().load_cart().await.unwrap();

    assert_eq!(totals.line_count, 2);
    assert_eq!(totals.item_count, 3);
    assert_eq!(totals.total_price, Money::from_cents(i64::MAX));

    // the cart lock was released, so later reads and mutations still work
    assert_eq!(h.client.cart().total_price().await, Money::from_cents(i64::MAX));
    let outcome = h.client.cart().add_to_cart(&mug).await.unwrap();
    assert!(outcome.is_confirmed());
}

#[tokio::test]
async fn test_overlapping_increments_can_diverge() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let product = h.product("Backpack", 999).await;
    h.store.insert_cart_line(&user.id, &product.id, 1).await;
    h.shop_as(&user).await;
    let cart = h.client.cart().clone();

    let first_call = h.store.hold_next(StoreOp::UpdateCartLine).await;
    let first = tokio::spawn({
        let cart = cart.clone();
        let product = product.clone();
        async move { cart.add_to_cart(&product).await }
    });
    first_call.arrived().await;
    assert_eq!(cart.item_count().await, 2);

    let second = cart.add_to_cart(&product).await.unwrap();
    assert!(second.is_confirmed());
    assert_eq!(cart.item_count().await, 3);

    first_call.fail();
    let first = first.await.unwrap().unwrap();
    assert!(first.is_rolled_back());

    // the first call's snapshot wins locally while the store kept the second write
    assert_eq!(cart.item_count().await, 1);
    assert_eq!(h.store.cart_lines_of(&user.id).await[0].quantity, 3);
}

#[tokio::test(start_paused = true)]
async fn test_hung_call_times_out_and_rolls_back() {
    let store = MemoryRemoteStore::new();
    let product = store.add_product("Backpack", Money::from_cents(999)).await;
    let owner = EntityId::from(1u64);
    store.insert_cart_line(&owner, &product.id, 1).await;

    let identity = Identity {
        id: owner,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: Role::User,
        session_token: "token".to_string(),
    };
    let (_identity_tx, identity_rx) = watch::channel(Some(identity));
    let cart = CartManager::new(
        Arc::new(store.clone()),
        identity_rx,
        Arc::new(NoOpEmitter),
        Duration::from_secs(10),
    );
    cart.load_cart().await.unwrap();

    // never released: the call hangs until the timeout
    let _held = store.hold_next(StoreOp::UpdateCartLine).await;
    let outcome = cart.add_to_cart(&product).await.unwrap();

    let reason = match outcome {
        MutationOutcome::RolledBack { reason } => reason,
        other => panic!("expected rollback, got {other:?}"),
    };
    assert!(reason.contains("timed out"), "reason: {reason}");
    assert_eq!(cart.item_count().await, 1);
}

#[tokio::test]
async fn test_identity_switch_clears_cart_before_reload() {
    let mut h = Harness::new().await;
    let ada = h.user("Ada", "ada@example.com").await;
    let bob = h.user("Bob", "bob@example.com").await;
    let mug = h.product("Mug", 500).await;
    let lamp = h.product("Lamp", 4_000).await;
    h.store.insert_cart_line(&ada.id, &mug.id, 2).await;
    h.store.insert_cart_line(&bob.id, &lamp.id, 1).await;

    h.client.start().await.unwrap();
    h.login(&ada).await;
    let cart = h.client.cart().clone();
    eventually(|| {
        let cart = cart.clone();
        async move { cart.item_count().await == 2 }
    })
    .await;

    let bob_load = h.store.hold_next(StoreOp::ListCartLines).await;
    h.client.session().logout().await.unwrap();
    h.login(&bob).await;
    bob_load.arrived().await;

    let view = cart.view().await;
    assert_eq!(view.owner, Some(bob.id.clone()));
    assert!(view.lines.is_empty());
    assert!(view.loading);

    bob_load.release();
    eventually(|| {
        let cart = cart.clone();
        async move { cart.total_price().await == Money::from_cents(4_000) }
    })
    .await;
    assert_eq!(cart.view().await.lines[0].product_id, lamp.id);

    h.client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_late_response_for_previous_user_is_discarded() {
    let h = Harness::new().await;
    let ada = h.user("Ada", "ada@example.com").await;
    let product = h.product("Mug", 500).await;
    h.store.insert_cart_line(&ada.id, &product.id, 1).await;
    h.shop_as(&ada).await;
    let cart = h.client.cart().clone();

    let held = h.store.hold_next(StoreOp::UpdateCartLine).await;
    let pending = tokio::spawn({
        let cart = cart.clone();
        let product = product.clone();
        async move { cart.add_to_cart(&product).await }
    });
    held.arrived().await;

    h.client.session().logout().await.unwrap();
    cart.load_cart().await.unwrap();
    held.fail();

    assert_eq!(pending.await.unwrap().unwrap(), MutationOutcome::Discarded);
    assert_eq!(cart.totals().await, CartTotals::default());
    assert!(cart.diagnostics().await.is_empty());
}
