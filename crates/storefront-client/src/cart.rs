//! # Cart Manager
//!
//! Holds the active Identity's cart as local state and keeps it in step with
//! the remote store using optimistic writes.
//!
//! ## Mutation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   caller ──► apply locally ──► emit totals ──► remote call              │
//! │               (snapshot kept)                      │                    │
//! │                                       ┌────────────┼────────────┐       │
//! │                                       ▼            ▼            ▼       │
//! │                                  ┌─────────┐ ┌───────────┐ ┌─────────┐  │
//! │   PendingMutation::Applying ───► │Confirmed│ │RolledBack │ │Discarded│  │
//! │                                  └─────────┘ └───────────┘ └─────────┘  │
//! │                                   rekey temp   restore       identity   │
//! │                                   line id      snapshot      changed    │
//! │                                                + diagnostic             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overlapping mutations on one line are not serialized. Each captures its
//! own snapshot and the last one to resolve decides the local state, which
//! can differ from the server when responses arrive out of order.
//!
//! Remote failures are not errors for the caller: the outcome is
//! `MutationOutcome::RolledBack` and a `CartDiagnostic` is recorded.

use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::validation::validate_quantity;
use storefront_core::{Cart, CartLine, CartTotals, EntityId, Identity, LineId, Money, Product};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult, StoreResult};
use crate::events::{CartDiagnostic, ClientEventEmitter};
use crate::remote::{with_timeout, NewCartLine, RemoteStore};

/// Rollback records kept for inspection.
const MAX_DIAGNOSTICS: usize = 32;

// =============================================================================
// Mutation State Machine
// =============================================================================

/// Which cart operation a mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Increment,
    Remove,
    SetQuantity,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Create => "create",
            MutationKind::Increment => "increment",
            MutationKind::Remove => "remove",
            MutationKind::SetQuantity => "set_quantity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    /// Applied locally, remote call outstanding.
    Applying,
    Confirmed,
    RolledBack,
    /// Resolved after the cart changed owner; left untouched.
    Discarded,
}

/// One optimistic change and the cart as it was before it.
#[derive(Debug)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub line_id: LineId,
    pub snapshot: Cart,
    pub epoch: u64,
    pub phase: MutationPhase,
}

impl PendingMutation {
    fn new(kind: MutationKind, line_id: LineId, snapshot: Cart, epoch: u64) -> Self {
        PendingMutation {
            kind,
            line_id,
            snapshot,
            epoch,
            phase: MutationPhase::Applying,
        }
    }

    fn transition(&mut self, to: MutationPhase) {
        debug!(
            kind = %self.kind,
            line_id = %self.line_id,
            from = ?self.phase,
            to = ?to,
            "Cart mutation phase change"
        );
        self.phase = to;
    }
}

/// How a cart mutation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the change. For a new line this is the
    /// server-assigned id.
    Confirmed { line_id: LineId },
    /// The store call failed and the local change was undone.
    RolledBack { reason: String },
    /// The cart switched owner before the store answered.
    Discarded,
}

impl MutationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, MutationOutcome::RolledBack { .. })
    }
}

enum RemoteCall {
    Create(NewCartLine),
    Update { id: EntityId, quantity: i64 },
    Delete(EntityId),
}

// =============================================================================
// State
// =============================================================================

/// Read-only copy of the cart for consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub owner: Option<EntityId>,
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct CartState {
    cart: Cart,
    /// Bumped whenever the cart changes owner.
    epoch: u64,
    loads_in_flight: usize,
    diagnostics: VecDeque<CartDiagnostic>,
}

impl CartState {
    /// Clears the cart if it belongs to someone else. Returns true on change.
    fn sync_owner(&mut self, owner: Option<&EntityId>) -> bool {
        if self.cart.owner() == owner {
            return false;
        }
        self.cart.clear_for(owner.cloned());
        self.epoch += 1;
        true
    }

    fn record(&mut self, diagnostic: CartDiagnostic) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }
}

// =============================================================================
// Cart Manager
// =============================================================================

pub struct CartManager {
    store: Arc<dyn RemoteStore>,
    identity_rx: watch::Receiver<Option<Identity>>,
    emitter: Arc<dyn ClientEventEmitter>,
    request_timeout: Duration,
    state: RwLock<CartState>,
}

impl CartManager {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        identity_rx: watch::Receiver<Option<Identity>>,
        emitter: Arc<dyn ClientEventEmitter>,
        request_timeout: Duration,
    ) -> Self {
        CartManager {
            store,
            identity_rx,
            emitter,
            request_timeout,
            state: RwLock::new(CartState::default()),
        }
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity_rx
            .borrow()
            .as_ref()
            .filter(|i| i.is_valid())
            .cloned()
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// The cart of the current Identity. Lines left over from a previous
    /// Identity are never shown.
    pub async fn view(&self) -> CartView {
        let owner = self.current_identity().map(|i| i.id);
        let state = self.state.read().await;
        let loading = state.loads_in_flight > 0;

        if owner.is_none() || state.cart.owner() != owner.as_ref() {
            return CartView {
                owner,
                loading,
                ..CartView::default()
            };
        }
        CartView {
            owner,
            lines: state.cart.lines().to_vec(),
            totals: state.cart.totals(),
            loading,
        }
    }

    pub async fn totals(&self) -> CartTotals {
        self.view().await.totals
    }

    pub async fn item_count(&self) -> i64 {
        self.totals().await.item_count
    }

    pub async fn total_price(&self) -> Money {
        self.totals().await.total_price
    }

    pub async fn loading(&self) -> bool {
        self.state.read().await.loads_in_flight > 0
    }

    /// Recent rollbacks, oldest first.
    pub async fn diagnostics(&self) -> Vec<CartDiagnostic> {
        self.state.read().await.diagnostics.iter().cloned().collect()
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Replaces local state with the store's lines for the current Identity.
    ///
    /// Anonymous sessions get an empty cart without a store call. Lines whose
    /// product no longer exists are dropped silently.
    pub async fn load_cart(&self) -> ClientResult<CartTotals> {
        let identity = self.current_identity();
        let owner = identity.as_ref().map(|i| i.id.clone());

        let (epoch, cleared) = {
            let mut state = self.state.write().await;
            let changed = state.sync_owner(owner.as_ref());
            if owner.is_some() {
                state.loads_in_flight += 1;
            }
            (state.epoch, changed.then(|| state.cart.totals()))
        };
        if let Some(totals) = cleared {
            self.emitter.emit_cart_changed(&totals);
        }

        let Some(owner) = owner else {
            debug!("No active session, cart is empty");
            return Ok(CartTotals::default());
        };

        debug!(user_id = %owner, "Loading cart");
        let result = with_timeout(self.request_timeout, self.store.list_cart_lines(&owner)).await;

        let mut state = self.state.write().await;
        state.loads_in_flight = state.loads_in_flight.saturating_sub(1);

        if state.epoch != epoch {
            debug!(user_id = %owner, "Discarding cart load for a previous session");
            return Ok(state.cart.totals());
        }

        let remote_lines = match result {
            Ok(lines) => lines,
            Err(e) => {
                drop(state);
                warn!(user_id = %owner, error = %e, "Cart load failed");
                return Err(ClientError::ServerError(e));
            }
        };

        let mut dropped = 0usize;
        let lines: Vec<CartLine> = remote_lines
            .into_iter()
            .filter_map(|remote| {
                let id = remote.id.clone();
                let line = remote.into_line();
                if line.is_none() {
                    debug!(line_id = %id, "Dropping cart line with broken product reference");
                    dropped += 1;
                }
                line
            })
            .collect();

        let (cart, rejected) = Cart::from_lines(owner.clone(), lines);
        for line in &rejected {
            warn!(
                line_id = %line.line_id,
                product_id = %line.product_id,
                quantity = line.quantity,
                "Ignoring cart line that breaks cart rules"
            );
        }

        state.cart = cart;
        let totals = state.cart.totals();
        drop(state);

        info!(
            user_id = %owner,
            lines = totals.line_count,
            items = totals.item_count,
            dropped,
            "Cart loaded"
        );
        self.emitter.emit_cart_changed(&totals);
        Ok(totals)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of `product`: increments its line or creates one.
    pub async fn add_to_cart(&self, product: &Product) -> ClientResult<MutationOutcome> {
        let Some(identity) = self.current_identity() else {
            warn!(product_id = %product.id, "Add to cart rejected: not signed in");
            return Err(ClientError::Unauthorized);
        };
        debug!(product_id = %product.id, "Add to cart");

        let (pending, call, totals) = {
            let mut state = self.state.write().await;
            state.sync_owner(Some(&identity.id));
            let snapshot = state.cart.clone();
            let existing = state
                .cart
                .find_by_product(&product.id)
                .map(|l| l.line_id.clone());

            match existing {
                Some(line_id) => {
                    let Some(remote_id) = line_id.as_remote().cloned() else {
                        drop(state);
                        return Ok(self.reject_unconfirmed(MutationKind::Increment, &line_id).await);
                    };
                    let quantity = state.cart.increment(&line_id, 1)?;
                    let pending =
                        PendingMutation::new(MutationKind::Increment, line_id, snapshot, state.epoch);
                    let call = RemoteCall::Update {
                        id: remote_id,
                        quantity,
                    };
                    (pending, call, state.cart.totals())
                }
                None => {
                    let line = CartLine::pending(identity.id.clone(), product);
                    let line_id = line.line_id.clone();
                    state.cart.push(line)?;
                    let pending =
                        PendingMutation::new(MutationKind::Create, line_id, snapshot, state.epoch);
                    let call = RemoteCall::Create(NewCartLine {
                        user_id: identity.id.clone(),
                        product_id: product.id.clone(),
                        quantity: 1,
                    });
                    (pending, call, state.cart.totals())
                }
            }
        };

        self.emitter.emit_cart_changed(&totals);
        Ok(self.execute(pending, call).await)
    }

    /// Removes a line.
    pub async fn remove_from_cart(&self, line_id: &LineId) -> ClientResult<MutationOutcome> {
        let Some(identity) = self.current_identity() else {
            return Err(ClientError::Unauthorized);
        };
        debug!(line_id = %line_id, "Remove from cart");

        let (pending, call, totals) = {
            let mut state = self.state.write().await;
            state.sync_owner(Some(&identity.id));
            if state.cart.find(line_id).is_none() {
                return Err(ClientError::not_found("Cart line", line_id.as_str()));
            }
            let Some(remote_id) = line_id.as_remote().cloned() else {
                drop(state);
                return Ok(self.reject_unconfirmed(MutationKind::Remove, line_id).await);
            };

            let snapshot = state.cart.clone();
            state.cart.remove(line_id)?;
            let pending =
                PendingMutation::new(MutationKind::Remove, line_id.clone(), snapshot, state.epoch);
            (pending, RemoteCall::Delete(remote_id), state.cart.totals())
        };

        self.emitter.emit_cart_changed(&totals);
        Ok(self.execute(pending, call).await)
    }

    /// Rewrites a line's quantity. Zero removes the line.
    pub async fn update_quantity(
        &self,
        line_id: &LineId,
        quantity: i64,
    ) -> ClientResult<MutationOutcome> {
        let Some(identity) = self.current_identity() else {
            return Err(ClientError::Unauthorized);
        };
        validate_quantity(quantity)?;
        if quantity == 0 {
            return self.remove_from_cart(line_id).await;
        }
        debug!(line_id = %line_id, quantity, "Update cart quantity");

        let (pending, call, totals) = {
            let mut state = self.state.write().await;
            state.sync_owner(Some(&identity.id));
            if state.cart.find(line_id).is_none() {
                return Err(ClientError::not_found("Cart line", line_id.as_str()));
            }
            let Some(remote_id) = line_id.as_remote().cloned() else {
                drop(state);
                return Ok(self.reject_unconfirmed(MutationKind::SetQuantity, line_id).await);
            };

            let snapshot = state.cart.clone();
            state.cart.set_quantity(line_id, quantity)?;
            let pending = PendingMutation::new(
                MutationKind::SetQuantity,
                line_id.clone(),
                snapshot,
                state.epoch,
            );
            let call = RemoteCall::Update {
                id: remote_id,
                quantity,
            };
            (pending, call, state.cart.totals())
        };

        self.emitter.emit_cart_changed(&totals);
        Ok(self.execute(pending, call).await)
    }

    /// Drops a line locally after the store already removed it.
    pub(crate) async fn forget_line(&self, line_id: &LineId) -> bool {
        let totals = {
            let mut state = self.state.write().await;
            if state.cart.remove(line_id).is_err() {
                return false;
            }
            state.cart.totals()
        };
        self.emitter.emit_cart_changed(&totals);
        true
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    async fn execute(&self, pending: PendingMutation, call: RemoteCall) -> MutationOutcome {
        let timeout = self.request_timeout;
        let result: StoreResult<Option<EntityId>> = match &call {
            RemoteCall::Create(line) => with_timeout(timeout, self.store.create_cart_line(line))
                .await
                .map(|created| Some(created.id)),
            RemoteCall::Update { id, quantity } => with_timeout(
                timeout,
                self.store.update_cart_line_quantity(id, *quantity),
            )
            .await
            .map(|_| None),
            RemoteCall::Delete(id) => with_timeout(timeout, self.store.delete_cart_line(id))
                .await
                .map(|_| None),
        };
        self.settle(pending, result).await
    }

    async fn settle(
        &self,
        mut pending: PendingMutation,
        result: StoreResult<Option<EntityId>>,
    ) -> MutationOutcome {
        let mut state = self.state.write().await;

        if state.epoch != pending.epoch {
            pending.transition(MutationPhase::Discarded);
            return MutationOutcome::Discarded;
        }

        match result {
            Ok(created) => {
                let mut line_id = pending.line_id.clone();
                if let Some(server_id) = created {
                    let confirmed = LineId::Remote(server_id);
                    if state.cart.rekey(&pending.line_id, confirmed.clone()).is_err() {
                        debug!(line_id = %pending.line_id, "Created line is no longer held locally");
                    }
                    line_id = confirmed;
                }
                pending.transition(MutationPhase::Confirmed);
                MutationOutcome::Confirmed { line_id }
            }
            Err(e) => {
                match pending.kind {
                    MutationKind::Create => {
                        let _ = state.cart.remove(&pending.line_id);
                    }
                    _ => state.cart = std::mem::take(&mut pending.snapshot),
                }
                let diagnostic = CartDiagnostic {
                    operation: pending.kind,
                    line_id: pending.line_id.to_string(),
                    reason: e.to_string(),
                    at: Utc::now(),
                };
                state.record(diagnostic.clone());
                let totals = state.cart.totals();
                pending.transition(MutationPhase::RolledBack);
                drop(state);

                warn!(
                    kind = %pending.kind,
                    line_id = %pending.line_id,
                    error = %e,
                    "Cart mutation rolled back"
                );
                self.emitter.emit_cart_diagnostic(&diagnostic);
                self.emitter.emit_cart_changed(&totals);
                MutationOutcome::RolledBack {
                    reason: diagnostic.reason,
                }
            }
        }
    }

    /// Mutations on a line the store has not confirmed yet cannot be sent;
    /// they end as a rollback without touching local state.
    async fn reject_unconfirmed(&self, kind: MutationKind, line_id: &LineId) -> MutationOutcome {
        let diagnostic = CartDiagnostic {
            operation: kind,
            line_id: line_id.to_string(),
            reason: "line is not confirmed by the store yet".to_string(),
            at: Utc::now(),
        };
        self.state.write().await.record(diagnostic.clone());

        warn!(kind = %kind, line_id = %line_id, "Cart mutation on unconfirmed line rolled back");
        self.emitter.emit_cart_diagnostic(&diagnostic);
        MutationOutcome::RolledBack {
            reason: diagnostic.reason,
        }
    }

    // =========================================================================
    // Identity Watch
    // =========================================================================

    /// Reloads the cart every time the active Identity changes, until
    /// `shutdown_rx` fires or the session is dropped.
    pub fn spawn_identity_watch(self: &Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut identity_rx = self.identity_rx.clone();

        tokio::spawn(async move {
            let mut current = active_id(&identity_rx.borrow_and_update());
            info!("Cart identity watcher started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cart identity watcher stopping");
                        break;
                    }
                    changed = identity_rx.changed() => {
                        if changed.is_err() {
                            debug!("Session closed, cart identity watcher stopping");
                            break;
                        }
                        let next = active_id(&identity_rx.borrow_and_update());
                        if next == current {
                            continue;
                        }
                        current = next;
                        if let Err(e) = manager.load_cart().await {
                            warn!(error = %e, "Cart reload after identity change failed");
                        }
                    }
                }
            }
        })
    }
}

fn active_id(identity: &Option<Identity>) -> Option<EntityId> {
    identity
        .as_ref()
        .filter(|i| i.is_valid())
        .map(|i| i.id.clone())
}
