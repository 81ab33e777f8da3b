//! # Client Events
//!
//! Side effects the managers signal to whatever front end drives them.
//!
//! ```text
//! SessionManager ──► emit_navigation("/shop" | "/admin" | "/login")
//! CartManager    ──► emit_cart_changed(totals)       after every local change
//!                ──► emit_cart_diagnostic(record)    after every rollback
//! ```
//!
//! Emitters are called synchronously while no lock is held and must not block.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use storefront_core::CartTotals;

use crate::cart::MutationKind;

/// Record of a cart mutation that was undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDiagnostic {
    pub operation: MutationKind,
    pub line_id: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Front-end notification hooks.
pub trait ClientEventEmitter: Send + Sync {
    /// The session asks the front end to show `route`.
    fn emit_navigation(&self, route: &str);

    /// Derived cart values changed.
    fn emit_cart_changed(&self, totals: &CartTotals);

    /// A cart mutation was rolled back.
    fn emit_cart_diagnostic(&self, diagnostic: &CartDiagnostic);
}

/// Emitter that drops everything.
pub struct NoOpEmitter;

impl ClientEventEmitter for NoOpEmitter {
    fn emit_navigation(&self, _route: &str) {}
    fn emit_cart_changed(&self, _totals: &CartTotals) {}
    fn emit_cart_diagnostic(&self, _diagnostic: &CartDiagnostic) {}
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    Navigation(String),
    CartChanged(CartTotals),
    CartDiagnostic(CartDiagnostic),
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Routes requested, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Navigation(route) => Some(route),
                _ => None,
            })
            .collect()
    }

    pub fn last_navigation(&self) -> Option<String> {
        self.navigations().pop()
    }

    pub fn diagnostics(&self) -> Vec<CartDiagnostic> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::CartDiagnostic(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ClientEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ClientEventEmitter for RecordingEmitter {
    fn emit_navigation(&self, route: &str) {
        self.push(ClientEvent::Navigation(route.to_string()));
    }

    fn emit_cart_changed(&self, totals: &CartTotals) {
        self.push(ClientEvent::CartChanged(*totals));
    }

    fn emit_cart_diagnostic(&self, diagnostic: &CartDiagnostic) {
        self.push(ClientEvent::CartDiagnostic(diagnostic.clone()));
    }
}
