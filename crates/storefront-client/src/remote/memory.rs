//! # In-Memory Remote Store
//!
//! An in-process stand-in for the remote resource store with json-server
//! semantics: per-collection numeric ids, exact-match filters, `_expand`
//! joins that yield nothing for dangling product references.
//!
//! ## Test Controls
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Call Gate (every operation)                      │
//! │                                                                         │
//! │  call ──► record StoreOp ──► injected failure? ──yes──► Err(500)        │
//! │                                    │ no                                 │
//! │                                    ▼                                    │
//! │                              held by test? ──yes──► wait for HeldCall   │
//! │                                    │ no              release() / fail() │
//! │                                    ▼                                    │
//! │                              apply to state ──► Ok(response)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A held call that is never released (and whose `HeldCall` is kept alive)
//! never resolves, which is how timeouts are exercised.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use storefront_core::{
    Account, EntityId, Money, NewAccount, Order, OrderStatus, Product, ProductDraft, Role,
};
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::debug;

use super::{NewCartLine, OrderQuery, RemoteCartLine, RemoteStore};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Operations
// =============================================================================

/// One kind of store call, used to target failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    FindAccounts,
    CreateAccount,
    GetAccount,
    ReplaceAccount,
    ListCartLines,
    CreateCartLine,
    UpdateCartLine,
    DeleteCartLine,
    ListProducts,
    GetProduct,
    CreateProduct,
    ReplaceProduct,
    DeleteProduct,
    ListOrders,
    CreateOrder,
    UpdateOrderStatus,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The error every injected failure produces.
pub fn injected_failure(op: StoreOp) -> StoreError {
    StoreError::Status {
        status: 500,
        message: format!("injected failure for {op}"),
    }
}

// =============================================================================
// Held Calls
// =============================================================================

enum HoldRelease {
    Proceed,
    Fail(StoreError),
}

struct Hold {
    arrived: Arc<Notify>,
    release: oneshot::Receiver<HoldRelease>,
}

/// Test handle for a call parked before it touches the store state.
///
/// Dropping the handle lets the call proceed normally.
pub struct HeldCall {
    op: StoreOp,
    arrived: Arc<Notify>,
    release: Option<oneshot::Sender<HoldRelease>>,
}

impl HeldCall {
    pub fn op(&self) -> StoreOp {
        self.op
    }

    /// Resolves once the targeted call has reached the store.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    /// Lets the call apply its effect and succeed.
    pub fn release(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(HoldRelease::Proceed);
        }
    }

    /// Makes the call fail without touching state.
    pub fn fail(mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(HoldRelease::Fail(injected_failure(self.op)));
        }
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct StoredCartLine {
    id: EntityId,
    user_id: EntityId,
    product_id: EntityId,
    quantity: i64,
}

impl StoredCartLine {
    fn to_remote(&self, product: Option<&Product>) -> RemoteCartLine {
        RemoteCartLine {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            product: product.map(Product::snapshot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Next(usize),
    Always,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    carts: Vec<StoredCartLine>,
    products: Vec<Product>,
    orders: Vec<Order>,
    next_ids: HashMap<&'static str, u64>,
    calls: Vec<StoreOp>,
    failures: HashMap<StoreOp, FailureMode>,
    holds: HashMap<StoreOp, VecDeque<Hold>>,
}

impl State {
    fn next_id(&mut self, collection: &'static str) -> EntityId {
        let next = self.next_ids.entry(collection).or_insert(1);
        let id = *next;
        *next += 1;
        EntityId::from(id)
    }

    fn take_failure(&mut self, op: StoreOp) -> bool {
        match self.failures.get(&op).copied() {
            Some(FailureMode::Always) => true,
            Some(FailureMode::Next(n)) => {
                if n <= 1 {
                    self.failures.remove(&op);
                } else {
                    self.failures.insert(op, FailureMode::Next(n - 1));
                }
                true
            }
            None => false,
        }
    }

    fn product(&self, id: &EntityId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }
}

// =============================================================================
// Store
// =============================================================================

/// In-process remote store.
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Seeding & Inspection (no gate, not recorded)
    // =========================================================================

    pub async fn add_account(&self, name: &str, email: &str, password: &str, role: Role) -> Account {
        let mut state = self.state.lock().await;
        let account = Account {
            id: state.next_id("users"),
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        };
        state.accounts.push(account.clone());
        account
    }

    pub async fn add_product(&self, title: &str, price: Money) -> Product {
        let mut state = self.state.lock().await;
        let product = Product {
            id: state.next_id("products"),
            title: title.to_string(),
            price,
            description: String::new(),
            category: String::new(),
            image: String::new(),
            rating: None,
        };
        state.products.push(product.clone());
        product
    }

    /// Stores a product under its own id.
    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.retain(|p| p.id != product.id);
        state.products.push(product);
    }

    /// Seeds a cart line and returns its id.
    pub async fn insert_cart_line(
        &self,
        user_id: &EntityId,
        product_id: &EntityId,
        quantity: i64,
    ) -> EntityId {
        let mut state = self.state.lock().await;
        let id = state.next_id("carts");
        state.carts.push(StoredCartLine {
            id: id.clone(),
            user_id: user_id.clone(),
            product_id: product_id.clone(),
            quantity,
        });
        id
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.state.lock().await.accounts.clone()
    }

    /// The store's view of one user's cart, product joined.
    pub async fn cart_lines_of(&self, user_id: &EntityId) -> Vec<RemoteCartLine> {
        let state = self.state.lock().await;
        state
            .carts
            .iter()
            .filter(|l| &l.user_id == user_id)
            .map(|l| l.to_remote(state.product(&l.product_id)))
            .collect()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    /// Every gated call so far, in arrival order.
    pub async fn calls(&self) -> Vec<StoreOp> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, op: StoreOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| **c == op)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    // =========================================================================
    // Failure Injection & Holds
    // =========================================================================

    /// The next call of `op` fails with a 500.
    pub async fn fail_next(&self, op: StoreOp) {
        let mut state = self.state.lock().await;
        let mode = match state.failures.get(&op) {
            Some(FailureMode::Next(n)) => FailureMode::Next(n + 1),
            Some(FailureMode::Always) => FailureMode::Always,
            None => FailureMode::Next(1),
        };
        state.failures.insert(op, mode);
    }

    /// Every call of `op` fails until cleared.
    pub async fn fail_always(&self, op: StoreOp) {
        self.state
            .lock()
            .await
            .failures
            .insert(op, FailureMode::Always);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Parks the next call of `op` until the returned handle decides.
    pub async fn hold_next(&self, op: StoreOp) -> HeldCall {
        let arrived = Arc::new(Notify::new());
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .await
            .holds
            .entry(op)
            .or_default()
            .push_back(Hold {
                arrived: arrived.clone(),
                release: rx,
            });
        HeldCall {
            op,
            arrived,
            release: Some(tx),
        }
    }

    async fn gate(&self, op: StoreOp) -> StoreResult<()> {
        let hold = {
            let mut state = self.state.lock().await;
            state.calls.push(op);
            if state.take_failure(op) {
                debug!(%op, "Injected store failure");
                return Err(injected_failure(op));
            }
            state.holds.get_mut(&op).and_then(VecDeque::pop_front)
        };

        if let Some(hold) = hold {
            debug!(%op, "Store call held");
            hold.arrived.notify_one();
            // a dropped handle means proceed
            if let Ok(HoldRelease::Fail(err)) = hold.release.await {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn find_accounts_by_email(&self, email: &str) -> StoreResult<Vec<Account>> {
        self.gate(StoreOp::FindAccounts).await?;
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.email == email)
            .cloned()
            .collect())
    }

    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account> {
        self.gate(StoreOp::CreateAccount).await?;
        let mut state = self.state.lock().await;
        let stored = Account {
            id: state.next_id("users"),
            name: account.name.clone(),
            email: account.email.clone(),
            password: account.password.clone(),
            role: account.role,
        };
        state.accounts.push(stored.clone());
        Ok(stored)
    }

    async fn get_account(&self, id: &EntityId) -> StoreResult<Account> {
        self.gate(StoreOp::GetAccount).await?;
        let state = self.state.lock().await;
        state
            .accounts
            .iter()
            .find(|a| &a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("users", id.as_str()))
    }

    async fn replace_account(&self, account: &Account) -> StoreResult<Account> {
        self.gate(StoreOp::ReplaceAccount).await?;
        let mut state = self.state.lock().await;
        let slot = state
            .accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| StoreError::not_found("users", account.id.as_str()))?;
        *slot = account.clone();
        Ok(account.clone())
    }

    async fn list_cart_lines(&self, owner: &EntityId) -> StoreResult<Vec<RemoteCartLine>> {
        self.gate(StoreOp::ListCartLines).await?;
        let state = self.state.lock().await;
        Ok(state
            .carts
            .iter()
            .filter(|l| &l.user_id == owner)
            .map(|l| l.to_remote(state.product(&l.product_id)))
            .collect())
    }

    async fn create_cart_line(&self, line: &NewCartLine) -> StoreResult<RemoteCartLine> {
        self.gate(StoreOp::CreateCartLine).await?;
        let mut state = self.state.lock().await;
        let stored = StoredCartLine {
            id: state.next_id("carts"),
            user_id: line.user_id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
        };
        state.carts.push(stored.clone());
        Ok(stored.to_remote(None))
    }

    async fn update_cart_line_quantity(
        &self,
        id: &EntityId,
        quantity: i64,
    ) -> StoreResult<RemoteCartLine> {
        self.gate(StoreOp::UpdateCartLine).await?;
        let mut state = self.state.lock().await;
        let line = state
            .carts
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| StoreError::not_found("carts", id.as_str()))?;
        line.quantity = quantity;
        Ok(line.to_remote(None))
    }

    async fn delete_cart_line(&self, id: &EntityId) -> StoreResult<()> {
        self.gate(StoreOp::DeleteCartLine).await?;
        let mut state = self.state.lock().await;
        let before = state.carts.len();
        state.carts.retain(|l| &l.id != id);
        if state.carts.len() == before {
            return Err(StoreError::not_found("carts", id.as_str()));
        }
        Ok(())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.gate(StoreOp::ListProducts).await?;
        Ok(self.state.lock().await.products.clone())
    }

    async fn get_product(&self, id: &EntityId) -> StoreResult<Product> {
        self.gate(StoreOp::GetProduct).await?;
        let state = self.state.lock().await;
        state
            .product(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("products", id.as_str()))
    }

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<Product> {
        self.gate(StoreOp::CreateProduct).await?;
        let mut state = self.state.lock().await;
        let product = product_from_draft(state.next_id("products"), draft);
        state.products.push(product.clone());
        Ok(product)
    }

    async fn replace_product(&self, id: &EntityId, draft: &ProductDraft) -> StoreResult<Product> {
        self.gate(StoreOp::ReplaceProduct).await?;
        let mut state = self.state.lock().await;
        let slot = state
            .products
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::not_found("products", id.as_str()))?;
        *slot = product_from_draft(id.clone(), draft);
        Ok(slot.clone())
    }

    async fn delete_product(&self, id: &EntityId) -> StoreResult<()> {
        self.gate(StoreOp::DeleteProduct).await?;
        let mut state = self.state.lock().await;
        let before = state.products.len();
        // cart lines keep pointing at the deleted product
        state.products.retain(|p| &p.id != id);
        if state.products.len() == before {
            return Err(StoreError::not_found("products", id.as_str()));
        }
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        self.gate(StoreOp::ListOrders).await?;
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| query.user_id.as_ref().map_or(true, |u| &o.user_id == u))
            .cloned()
            .collect();
        if query.newest_first {
            orders.sort_by(|a, b| b.date.cmp(&a.date));
        }
        Ok(orders)
    }

    async fn create_order(&self, order: &Order) -> StoreResult<Order> {
        self.gate(StoreOp::CreateOrder).await?;
        let mut state = self.state.lock().await;
        let mut stored = order.clone();
        stored.id = Some(state.next_id("orders"));
        state.orders.push(stored.clone());
        Ok(stored)
    }

    async fn update_order_status(
        &self,
        id: &EntityId,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        self.gate(StoreOp::UpdateOrderStatus).await?;
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id.as_ref() == Some(id))
            .ok_or_else(|| StoreError::not_found("orders", id.as_str()))?;
        order.status = status;
        Ok(order.clone())
    }
}

fn product_from_draft(id: EntityId, draft: &ProductDraft) -> Product {
    Product {
        id,
        title: draft.title.clone(),
        price: draft.price,
        description: draft.description.clone(),
        category: draft.category.clone(),
        image: draft.image.clone(),
        rating: None,
    }
}
