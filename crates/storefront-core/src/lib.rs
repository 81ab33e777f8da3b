//! # storefront-core: Pure Domain Logic for the Storefront Client
//!
//! This crate holds the rules of the session and cart engine as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Client Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 Consumers (CLI, views)                          │    │
//! │  │    nav badge ──► cart page ──► checkout ──► admin pages         │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │        storefront-client (SessionManager, CartManager)          │    │
//! │  │        optimistic mutation, rollback, remote store calls        │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐    │    │
//! │  │   │   types   │  │   money   │  │   cart    │  │  access   │    │    │
//! │  │   │ Identity  │  │   Money   │  │   Cart    │  │   guard   │    │    │
//! │  │   │ Product   │  │  decimal  │  │ CartLine  │  │   Area    │    │    │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘    │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Identity, Account, Product, Order and friends
//! - [`money`] - Integer-cents money with an exact decimal JSON adapter
//! - [`cart`] - The cart collection and its invariants
//! - [`access`] - Route guard over Identity and Role
//! - [`stats`] - Admin dashboard aggregates over products and orders
//! - [`validation`] - Form input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::{Cart, CartLine, EntityId, Money, Product};
//!
//! let owner = EntityId::from(1u64);
//! let product = Product {
//!     id: EntityId::from(7u64),
//!     title: "Backpack".to_string(),
//!     price: Money::from_cents(999),
//!     description: String::new(),
//!     category: String::new(),
//!     image: String::new(),
//!     rating: None,
//! };
//!
//! let mut cart = Cart::for_owner(owner.clone());
//! cart.push(CartLine::pending(owner, &product)).unwrap();
//! assert_eq!(cart.item_count(), 1);
//! assert_eq!(cart.total_price().to_string(), "$9.99");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod cart;
pub mod error;
pub mod money;
pub mod stats;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use access::{guard, AccessDecision, Area};
pub use cart::{Cart, CartLine, CartTotals, LineId};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use stats::{CategoryCount, DashboardStats, DayCount};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
