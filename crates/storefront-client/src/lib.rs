//! # storefront-client: Session and Cart State Engine
//!
//! Keeps the signed-in Identity and the active cart as local state that
//! stays consistent with an authoritative remote store under latency and
//! failure.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       StorefrontClient (context)                        │
//! │                                                                         │
//! │  ┌────────────────┐ watch<Identity> ┌────────────────┐                  │
//! │  │ SessionManager │────────────────►│  CartManager   │                  │
//! │  │                │                 │                │                  │
//! │  │ login/register │                 │ optimistic     │                  │
//! │  │ logout/restore │                 │ add/remove/set │                  │
//! │  │ access guard   │                 │ + rollback     │                  │
//! │  └───────┬────────┘                 └───────┬────────┘                  │
//! │          │ persisted record                 │                           │
//! │          ▼                                  ▼                           │
//! │  ┌────────────────┐                 ┌────────────────────────────────┐  │
//! │  │ storefront-db  │                 │ RemoteStore (HTTP / in-memory) │  │
//! │  │ SQLite (WAL)   │                 │ /users /carts /products /orders│  │
//! │  └────────────────┘                 └────────────────────────────────┘  │
//! │                                                                         │
//! │  Checkout, Orders, Catalog and Profile services sit on top of both.     │
//! │                                                                         │
//! │  EVENTS (to the front end via ClientEventEmitter):                      │
//! │  • navigation requests after login, registration and logout             │
//! │  • cart totals after every local cart change                            │
//! │  • diagnostics for every rolled-back cart mutation                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`session`] - `SessionManager`, authentication and persistence
//! - [`cart`] - `CartManager`, optimistic mutations with rollback
//! - [`checkout`] - cart lines to orders
//! - [`orders`] - order history and admin order management
//! - [`catalog`] - product listing and admin product CRUD
//! - [`profile`] - own-account edits
//! - [`remote`] - `RemoteStore` port, HTTP adapter and in-memory store
//! - [`token`] - session token minting and verification
//! - [`events`] - front-end notification hooks
//! - [`config`] - layered configuration
//! - [`context`] - `StorefrontClient` and its builder
//! - [`error`] - error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_client::{ClientConfig, StorefrontClient};
//!
//! let config = ClientConfig::load_or_init(None)?;
//! let mut client = StorefrontClient::builder(config).build().await?;
//! client.start().await?;
//!
//! client.session().login("ada@example.com", "secret").await?;
//! let product = client.catalog().get_product(&"7".into()).await?;
//! client.cart().add_to_cart(&product).await?;
//! println!("{} items", client.cart().item_count().await);
//!
//! client.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod orders;
pub mod profile;
pub mod remote;
pub mod session;
pub mod token;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart::{CartManager, CartView, MutationKind, MutationOutcome, MutationPhase};
pub use catalog::CatalogService;
pub use checkout::{CheckoutFailure, CheckoutReceipt, CheckoutService};
pub use config::ClientConfig;
pub use context::{StorefrontClient, StorefrontClientBuilder};
pub use error::{ClientError, ClientResult, StoreError, StoreResult};
pub use events::{CartDiagnostic, ClientEvent, ClientEventEmitter, NoOpEmitter, RecordingEmitter};
pub use orders::OrderService;
pub use profile::ProfileService;
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
pub use session::{AuthState, SessionManager};
pub use token::{SessionClaims, TokenIssuer};
