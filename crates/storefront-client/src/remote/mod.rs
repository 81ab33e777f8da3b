//! # Remote Resource Store
//!
//! The port every manager talks to, plus its two adapters.
//!
//! ## Resource Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Remote Store Resources                            │
//! │                                                                         │
//! │  /users     GET ?email=   POST   GET /{id}   PUT /{id}                  │
//! │  /carts     GET ?userId=&_expand=product                                │
//! │             POST   PATCH /{id} {quantity}   DELETE /{id}                │
//! │  /products  GET   GET /{id}   POST   PUT /{id}   DELETE /{id}           │
//! │  /orders    GET [?userId=][&_sort=date&_order=desc]                     │
//! │             POST   PATCH /{id} {status}                                 │
//! │                                                                         │
//! │  ┌────────────────────┐        ┌─────────────────────────────────────┐  │
//! │  │  HttpRemoteStore   │        │  MemoryRemoteStore                  │  │
//! │  │  (reqwest, JSON)   │        │  (in-process, failure injection,    │  │
//! │  │                    │        │   held calls for race tests)        │  │
//! │  └────────────────────┘        └─────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use storefront_core::{
    Account, CartLine, EntityId, LineId, NewAccount, Order, OrderStatus, Product, ProductDraft,
    ProductSnapshot,
};

use crate::error::{StoreError, StoreResult};

pub use http::HttpRemoteStore;
pub use memory::{HeldCall, MemoryRemoteStore, StoreOp};

// =============================================================================
// Wire Types
// =============================================================================

/// A cart line as the store returns it, product embedded when expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartLine {
    pub id: EntityId,
    pub user_id: EntityId,
    pub product_id: EntityId,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSnapshot>,
}

impl RemoteCartLine {
    /// Converts to a cart line. Lines whose product could not be joined
    /// return `None`.
    pub fn into_line(self) -> Option<CartLine> {
        let product = self.product?;
        Some(CartLine {
            line_id: LineId::Remote(self.id),
            owner_id: self.user_id,
            product_id: self.product_id,
            quantity: self.quantity,
            product,
        })
    }
}

/// Body of `POST /carts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartLine {
    pub user_id: EntityId,
    pub product_id: EntityId,
    pub quantity: i64,
}

/// Filter for `GET /orders`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only this user's orders; `None` lists everything.
    pub user_id: Option<EntityId>,
    /// Sort by date, newest first.
    pub newest_first: bool,
}

impl OrderQuery {
    pub fn for_user(user_id: EntityId) -> Self {
        OrderQuery {
            user_id: Some(user_id),
            newest_first: true,
        }
    }

    pub fn all() -> Self {
        OrderQuery {
            user_id: None,
            newest_first: true,
        }
    }
}

// =============================================================================
// Port
// =============================================================================

/// Request/response access to the remote resource collections.
///
/// Implementations own transport only. Business rules (credential checks,
/// optimistic state, role gates) live in the managers.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ---- accounts ----------------------------------------------------------

    /// `GET /users?email=<e>`. Empty when nobody matches.
    async fn find_accounts_by_email(&self, email: &str) -> StoreResult<Vec<Account>>;

    /// `POST /users`. Returns the stored record with its assigned id.
    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account>;

    /// `GET /users/<id>`.
    async fn get_account(&self, id: &EntityId) -> StoreResult<Account>;

    /// `PUT /users/<id>`.
    async fn replace_account(&self, account: &Account) -> StoreResult<Account>;

    // ---- cart lines --------------------------------------------------------

    /// `GET /carts?userId=<id>&_expand=product`.
    async fn list_cart_lines(&self, owner: &EntityId) -> StoreResult<Vec<RemoteCartLine>>;

    /// `POST /carts`.
    async fn create_cart_line(&self, line: &NewCartLine) -> StoreResult<RemoteCartLine>;

    /// `PATCH /carts/<id>` with `{quantity}`.
    async fn update_cart_line_quantity(
        &self,
        id: &EntityId,
        quantity: i64,
    ) -> StoreResult<RemoteCartLine>;

    /// `DELETE /carts/<id>`.
    async fn delete_cart_line(&self, id: &EntityId) -> StoreResult<()>;

    // ---- products ----------------------------------------------------------

    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    async fn get_product(&self, id: &EntityId) -> StoreResult<Product>;

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<Product>;

    async fn replace_product(&self, id: &EntityId, draft: &ProductDraft) -> StoreResult<Product>;

    async fn delete_product(&self, id: &EntityId) -> StoreResult<()>;

    // ---- orders ------------------------------------------------------------

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;

    /// `POST /orders`. The returned order carries its id.
    async fn create_order(&self, order: &Order) -> StoreResult<Order>;

    /// `PATCH /orders/<id>` with `{status}`.
    async fn update_order_status(&self, id: &EntityId, status: OrderStatus)
        -> StoreResult<Order>;
}

/// Runs a store call under `limit`. An elapsed timer is a `Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_line_with_product_converts() {
        let remote: RemoteCartLine = serde_json::from_value(json!({
            "id": 12, "userId": 3, "productId": 7, "quantity": 2,
            "product": {"id": 7, "title": "Backpack", "price": 9.99, "image": "b.png",
                        "category": "bags"}
        }))
        .unwrap();

        let line = remote.into_line().unwrap();
        assert_eq!(line.line_id, LineId::remote("12"));
        assert_eq!(line.owner_id.as_str(), "3");
        assert_eq!(line.line_total().cents(), 1998);
    }

    #[test]
    fn test_remote_line_without_product_is_dropped() {
        let remote: RemoteCartLine = serde_json::from_value(json!({
            "id": 12, "userId": 3, "productId": 404, "quantity": 1
        }))
        .unwrap();
        assert!(remote.into_line().is_none());
    }

    #[test]
    fn test_new_cart_line_wire_shape() {
        let body = NewCartLine {
            user_id: EntityId::from(3u64),
            product_id: EntityId::from(7u64),
            quantity: 1,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"userId": 3, "productId": 7, "quantity": 1})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let limit = Duration::from_millis(50);
        let result: StoreResult<()> = with_timeout(limit, std::future::pending()).await;
        assert_eq!(result, Err(StoreError::Timeout(limit)));
    }
}
