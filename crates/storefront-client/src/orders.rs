//! Order history for users, and order management plus dashboard figures
//! for admins.

use std::sync::Arc;
use std::time::Duration;
use storefront_core::{DashboardStats, EntityId, Order, OrderStatus, Role};
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::remote::{with_timeout, OrderQuery, RemoteStore};
use crate::session::SessionManager;

pub struct OrderService {
    store: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    request_timeout: Duration,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<SessionManager>,
        request_timeout: Duration,
    ) -> Self {
        OrderService {
            store,
            session,
            request_timeout,
        }
    }

    /// The signed-in user's orders, newest first.
    pub async fn my_orders(&self) -> ClientResult<Vec<Order>> {
        let identity = self.session.require_identity()?;
        let orders = with_timeout(
            self.request_timeout,
            self.store.list_orders(&OrderQuery::for_user(identity.id.clone())),
        )
        .await?;
        debug!(user_id = %identity.id, count = orders.len(), "Orders listed");
        Ok(orders)
    }

    /// Every order in the store. Admin only.
    pub async fn all_orders(&self) -> ClientResult<Vec<Order>> {
        self.session.require(Role::Admin)?;
        let orders = with_timeout(self.request_timeout, self.store.list_orders(&OrderQuery::all())).await?;
        debug!(count = orders.len(), "All orders listed");
        Ok(orders)
    }

    /// Moves an order to `status`. Admin only.
    pub async fn update_status(&self, order_id: &EntityId, status: OrderStatus) -> ClientResult<Order> {
        let admin = self.session.require(Role::Admin)?;
        let order = with_timeout(
            self.request_timeout,
            self.store.update_order_status(order_id, status),
        )
        .await?;
        info!(order_id = %order_id, status = %status, admin_id = %admin.id, "Order status updated");
        Ok(order)
    }

    /// Product and order figures for the admin dashboard. Admin only.
    pub async fn dashboard(&self) -> ClientResult<DashboardStats> {
        self.session.require(Role::Admin)?;
        let all_orders = OrderQuery::all();
        let (products, orders) = tokio::try_join!(
            with_timeout(self.request_timeout, self.store.list_products()),
            with_timeout(self.request_timeout, self.store.list_orders(&all_orders)),
        )?;

        let stats = DashboardStats::compute(&products, &orders);
        debug!(
            products = stats.total_products,
            orders = stats.total_orders,
            categories = stats.orders_by_category.len(),
            "Dashboard computed"
        );
        Ok(stats)
    }
}
