//! Checkout: turns the confirmed cart lines into orders.
//!
//! ```text
//! for each confirmed line, in cart order:
//!     POST /orders        (Order::from_line, status Pending)
//!     DELETE /carts/<id>
//!     drop the line locally
//! stop at the first failure; then reload the cart from the store
//! ```
//!
//! Lines still waiting for their create to be confirmed are skipped.
//!
//! [`CheckoutService::buy_now`] places a single-unit order for one product
//! and leaves the cart alone.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{LineId, Money, Order, Product};
use tracing::{debug, info, warn};

use crate::cart::CartManager;
use crate::error::{ClientResult, StoreError};
use crate::remote::{with_timeout, RemoteStore};
use crate::session::SessionManager;

/// Which step of which line stopped the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutFailure {
    pub line_id: String,
    /// Whether the order for this line had already been placed.
    pub order_placed: bool,
    pub reason: String,
}

/// Result of one checkout run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    /// Sum of the placed orders' prices.
    pub total: Money,
    /// Unconfirmed lines left in the cart.
    pub skipped: usize,
    pub interrupted: Option<CheckoutFailure>,
}

impl CheckoutReceipt {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

pub struct CheckoutService {
    store: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    cart: Arc<CartManager>,
    request_timeout: Duration,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<SessionManager>,
        cart: Arc<CartManager>,
        request_timeout: Duration,
    ) -> Self {
        CheckoutService {
            store,
            session,
            cart,
            request_timeout,
        }
    }

    /// Places one order per cart line. An empty cart yields an empty receipt.
    pub async fn checkout(&self) -> ClientResult<CheckoutReceipt> {
        let identity = self.session.require_identity()?;
        let view = self.cart.view().await;

        let mut receipt = CheckoutReceipt::default();
        if view.lines.is_empty() {
            debug!(user_id = %identity.id, "Checkout with empty cart");
            return Ok(receipt);
        }
        info!(user_id = %identity.id, lines = view.lines.len(), "Checkout started");

        for line in &view.lines {
            let Some(remote_id) = line.line_id.as_remote() else {
                receipt.skipped += 1;
                continue;
            };

            let order = Order::from_line(line, Utc::now());
            let placed = match with_timeout(self.request_timeout, self.store.create_order(&order)).await {
                Ok(placed) => placed,
                Err(e) => {
                    receipt.interrupted = Some(failure(&line.line_id, false, e));
                    break;
                }
            };
            receipt.total += placed.price;
            receipt.orders.push(placed);

            if let Err(e) = with_timeout(self.request_timeout, self.store.delete_cart_line(remote_id)).await {
                receipt.interrupted = Some(failure(&line.line_id, true, e));
                break;
            }
            self.cart.forget_line(&line.line_id).await;
        }

        match &receipt.interrupted {
            None => info!(
                user_id = %identity.id,
                orders = receipt.orders.len(),
                total = %receipt.total,
                skipped = receipt.skipped,
                "Checkout complete"
            ),
            Some(f) => warn!(
                user_id = %identity.id,
                orders = receipt.orders.len(),
                line_id = %f.line_id,
                order_placed = f.order_placed,
                reason = %f.reason,
                "Checkout interrupted"
            ),
        }

        if let Err(e) = self.cart.load_cart().await {
            warn!(error = %e, "Cart reload after checkout failed");
        }
        Ok(receipt)
    }

    /// Orders one unit of `product` directly. The cart is not touched.
    pub async fn buy_now(&self, product: &Product) -> ClientResult<Order> {
        let identity = self.session.require_identity()?;
        debug!(user_id = %identity.id, product_id = %product.id, "Buy now");

        let order = Order::from_product(identity.id.clone(), product, Utc::now());
        let placed = with_timeout(self.request_timeout, self.store.create_order(&order))
            .await
            .map_err(|e| {
                warn!(product_id = %product.id, error = %e, "Buy now failed");
                e
            })?;

        info!(
            user_id = %identity.id,
            order_id = ?placed.id.as_ref().map(|id| id.as_str()),
            price = %placed.price,
            "Order placed"
        );
        Ok(placed)
    }
}

fn failure(line_id: &LineId, order_placed: bool, err: StoreError) -> CheckoutFailure {
    CheckoutFailure {
        line_id: line_id.to_string(),
        order_placed,
        reason: err.to_string(),
    }
}
