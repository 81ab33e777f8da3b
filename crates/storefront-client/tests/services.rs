//! Checkout, orders, catalog and profile on top of the session and cart.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::Harness;
use storefront_client::remote::StoreOp;
use storefront_client::{ClientError, RemoteStore};
use storefront_core::{AccountUpdate, Money, Order, OrderStatus, Product, ProductDraft, Role};

fn draft(title: &str, cents: i64) -> ProductDraft {
    ProductDraft {
        title: title.to_string(),
        price: Money::from_cents(cents),
        description: "Sturdy".to_string(),
        category: "bags".to_string(),
        image: "backpack.png".to_string(),
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_places_one_order_per_line() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let backpack = h.product("Backpack", 999).await;
    let mug = h.product("Mug", 500).await;
    h.store.insert_cart_line(&user.id, &backpack.id, 2).await;
    h.store.insert_cart_line(&user.id, &mug.id, 1).await;
    h.shop_as(&user).await;

    let receipt = h.client.checkout().checkout().await.unwrap();

    assert!(receipt.is_complete());
    assert_eq!(receipt.orders.len(), 2);
    assert_eq!(receipt.total, Money::from_cents(2498));
    assert!(receipt
        .orders
        .iter()
        .all(|o| o.status == OrderStatus::Pending && o.user_id == user.id && o.id.is_some()));
    assert_eq!(receipt.orders[0].price, Money::from_cents(1998));
    assert_eq!(receipt.orders[0].quantity, 2);

    assert!(h.store.cart_lines_of(&user.id).await.is_empty());
    assert_eq!(h.store.orders().await.len(), 2);
    assert_eq!(h.client.cart().item_count().await, 0);
}

#[tokio::test]
async fn test_checkout_stops_at_first_failure() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let backpack = h.product("Backpack", 999).await;
    let mug = h.product("Mug", 500).await;
    h.store.insert_cart_line(&user.id, &backpack.id, 1).await;
    h.store.insert_cart_line(&user.id, &mug.id, 1).await;
    h.shop_as(&user).await;

    h.store.fail_next(StoreOp::DeleteCartLine).await;
    let receipt = h.client.checkout().checkout().await.unwrap();

    let failure = receipt.interrupted.clone().unwrap();
    assert!(failure.order_placed);
    assert_eq!(receipt.orders.len(), 1);
    assert_eq!(h.store.call_count(StoreOp::CreateOrder).await, 1);

    // both lines are still in the store and the reload shows them
    assert_eq!(h.store.cart_lines_of(&user.id).await.len(), 2);
    assert_eq!(h.client.cart().totals().await.line_count, 2);
}

#[tokio::test]
async fn test_checkout_requires_session_and_lines() {
    let h = Harness::new().await;
    let err = h.client.checkout().checkout().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));

    let user = h.user("Ada", "ada@example.com").await;
    h.shop_as(&user).await;
    let receipt = h.client.checkout().checkout().await.unwrap();
    assert!(receipt.orders.is_empty());
    assert_eq!(receipt.total, Money::from_cents(0));
    assert_eq!(h.store.call_count(StoreOp::CreateOrder).await, 0);
}

#[tokio::test]
async fn test_buy_now_places_single_order_and_leaves_cart() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let backpack = h.product("Backpack", 999).await;
    let mug = h.product("Mug", 500).await;
    h.store.insert_cart_line(&user.id, &mug.id, 3).await;
    h.shop_as(&user).await;
    h.store.clear_calls().await;

    let order = h.client.checkout().buy_now(&backpack).await.unwrap();

    assert!(order.id.is_some());
    assert_eq!(order.user_id, user.id);
    assert_eq!(order.product_id, backpack.id);
    assert_eq!(order.price, Money::from_cents(999));
    assert_eq!(order.quantity, 1);
    assert_eq!(order.status, OrderStatus::Pending);

    assert_eq!(h.store.calls().await, vec![StoreOp::CreateOrder]);
    assert_eq!(h.store.cart_lines_of(&user.id).await.len(), 1);
    assert_eq!(h.client.cart().item_count().await, 3);
    assert_eq!(h.client.orders().my_orders().await.unwrap(), vec![order]);
}

#[tokio::test]
async fn test_buy_now_requires_session() {
    let h = Harness::new().await;
    let backpack = h.product("Backpack", 999).await;

    let err = h.client.checkout().buy_now(&backpack).await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized));
    assert_eq!(h.store.call_count(StoreOp::CreateOrder).await, 0);
}

#[tokio::test]
async fn test_buy_now_failure_places_nothing() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let backpack = h.product("Backpack", 999).await;
    h.login(&user).await;

    h.store.fail_next(StoreOp::CreateOrder).await;
    let err = h.client.checkout().buy_now(&backpack).await.unwrap_err();

    assert!(matches!(err, ClientError::ServerError(_)));
    assert!(h.store.orders().await.is_empty());
}

// =============================================================================
// Orders
// =============================================================================

async fn seed_order(h: &Harness, user: &storefront_core::Account, hours_ago: i64) -> Order {
    let order = Order {
        id: None,
        user_id: user.id.clone(),
        product_id: "1".into(),
        title: "Backpack".to_string(),
        price: Money::from_cents(999),
        quantity: 1,
        status: OrderStatus::Pending,
        date: Utc::now() - ChronoDuration::hours(hours_ago),
    };
    h.store.create_order(&order).await.unwrap()
}

#[tokio::test]
async fn test_my_orders_newest_first() {
    let h = Harness::new().await;
    let ada = h.user("Ada", "ada@example.com").await;
    let bob = h.user("Bob", "bob@example.com").await;
    let old = seed_order(&h, &ada, 48).await;
    let new = seed_order(&h, &ada, 1).await;
    seed_order(&h, &bob, 2).await;

    h.login(&ada).await;
    let orders = h.client.orders().my_orders().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, new.id);
    assert_eq!(orders[1].id, old.id);
}

#[tokio::test]
async fn test_order_management_is_admin_only() {
    let h = Harness::new().await;
    let ada = h.user("Ada", "ada@example.com").await;
    let order = seed_order(&h, &ada, 1).await;
    let order_id = order.id.clone().unwrap();

    h.login(&ada).await;
    assert!(matches!(
        h.client.orders().all_orders().await,
        Err(ClientError::Forbidden { required: Role::Admin })
    ));
    assert!(matches!(
        h.client
            .orders()
            .update_status(&order_id, OrderStatus::Shipped)
            .await,
        Err(ClientError::Forbidden { .. })
    ));

    let root = h.admin().await;
    h.login(&root).await;
    assert_eq!(h.client.orders().all_orders().await.unwrap().len(), 1);
    let updated = h
        .client
        .orders()
        .update_status(&order_id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn test_dashboard_aggregates_products_and_orders() {
    let h = Harness::new().await;
    let ada = h.user("Ada", "ada@example.com").await;
    let bag = h.store.create_product(&draft("Backpack", 999)).await.unwrap();
    let mut lamp_draft = draft("Lamp", 4_000);
    lamp_draft.category = "lighting".to_string();
    let lamp = h.store.create_product(&lamp_draft).await.unwrap();

    let order_for = |product: &Product, hours_ago: i64| Order {
        id: None,
        user_id: ada.id.clone(),
        product_id: product.id.clone(),
        title: product.title.clone(),
        price: product.price,
        quantity: 1,
        status: OrderStatus::Pending,
        date: Utc::now() - ChronoDuration::hours(hours_ago),
    };
    for (product, hours_ago) in [(&bag, 1), (&bag, 2), (&lamp, 3), (&bag, 4), (&lamp, 5), (&bag, 6)] {
        h.store.create_order(&order_for(product, hours_ago)).await.unwrap();
    }
    // an order for a product that no longer exists
    let gone = h.store.create_product(&draft("Gone", 100)).await.unwrap();
    h.store.create_order(&order_for(&gone, 7)).await.unwrap();
    h.store.delete_product(&gone.id).await.unwrap();

    h.login(&ada).await;
    assert!(matches!(
        h.client.orders().dashboard().await,
        Err(ClientError::Forbidden { required: Role::Admin })
    ));

    let root = h.admin().await;
    h.login(&root).await;
    let stats = h.client.orders().dashboard().await.unwrap();

    assert_eq!(stats.total_products, 2);
    assert_eq!(stats.total_orders, 7);
    assert_eq!(stats.recent_orders.len(), 5);
    assert!(stats
        .recent_orders
        .windows(2)
        .all(|pair| pair[0].date >= pair[1].date));

    let by_category: Vec<(&str, usize)> = stats
        .orders_by_category
        .iter()
        .map(|c| (c.category.as_str(), c.orders))
        .collect();
    assert_eq!(by_category, vec![("Other", 1), ("bags", 4), ("lighting", 2)]);
    assert_eq!(stats.orders_by_day.iter().map(|d| d.orders).sum::<usize>(), 7);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_reads_are_open() {
    let h = Harness::new().await;
    let product = h.product("Backpack", 999).await;

    assert_eq!(h.client.catalog().list_products().await.unwrap().len(), 1);
    assert_eq!(h.client.catalog().get_product(&product.id).await.unwrap(), product);
    assert!(matches!(
        h.client.catalog().get_product(&"404".into()).await,
        Err(ClientError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_catalog_writes_need_admin() {
    let h = Harness::new().await;
    assert!(matches!(
        h.client.catalog().create_product(&draft("Backpack", 999)).await,
        Err(ClientError::Unauthorized)
    ));

    let user = h.user("Ada", "ada@example.com").await;
    h.login(&user).await;
    assert!(matches!(
        h.client.catalog().create_product(&draft("Backpack", 999)).await,
        Err(ClientError::Forbidden { required: Role::Admin })
    ));
    assert_eq!(h.store.call_count(StoreOp::CreateProduct).await, 0);

    let root = h.admin().await;
    h.login(&root).await;
    let created = h
        .client
        .catalog()
        .create_product(&draft("Backpack", 999))
        .await
        .unwrap();
    let updated = h
        .client
        .catalog()
        .update_product(&created.id, &draft("Backpack XL", 1_499))
        .await
        .unwrap();
    assert_eq!(updated.price, Money::from_cents(1_499));

    assert!(matches!(
        h.client.catalog().create_product(&draft("  ", 100)).await,
        Err(ClientError::Validation(_))
    ));

    h.client.catalog().delete_product(&created.id).await.unwrap();
    assert!(h.client.catalog().list_products().await.unwrap().is_empty());
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_profile_save_updates_identity() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    let before = h.login(&user).await;

    let saved = h
        .client
        .profile()
        .save(AccountUpdate {
            name: Some("Ada Lovelace".to_string()),
            ..AccountUpdate::default()
        })
        .await
        .unwrap();

    assert_eq!(saved.name, "Ada Lovelace");
    assert_eq!(saved.password, "pw1234");
    assert_eq!(h.client.profile().load().await.unwrap(), saved);

    let identity = h.client.session().identity().unwrap();
    assert_eq!(identity.name, "Ada Lovelace");
    assert_eq!(identity.session_token, before.session_token);
    let persisted = h.client.session().read_persisted().await.unwrap().unwrap();
    assert_eq!(persisted, identity);
}

#[tokio::test]
async fn test_profile_rejects_bad_email_before_store_call() {
    let h = Harness::new().await;
    let user = h.user("Ada", "ada@example.com").await;
    h.login(&user).await;
    h.store.clear_calls().await;

    let err = h
        .client
        .profile()
        .save(AccountUpdate {
            email: Some("not an email".to_string()),
            ..AccountUpdate::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(h.store.calls().await.is_empty());
}
