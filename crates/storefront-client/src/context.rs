//! # Storefront Client Context
//!
//! One value that owns the managers and services of a client instance and
//! drives their lifecycle.
//!
//! ```text
//! StorefrontClientBuilder::new(config)
//!     .with_store(..)      default: HttpRemoteStore at config.api.base_url
//!     .with_database(..)   default: SQLite at config.database_path()
//!     .with_emitter(..)    default: NoOpEmitter
//!     .build().await
//!
//! start():    restore persisted session ─► load cart ─► spawn identity watcher
//! shutdown(): stop identity watcher
//! ```

use std::sync::Arc;
use storefront_core::AccessDecision;
use storefront_db::{Database, DbConfig};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::cart::CartManager;
use crate::catalog::CatalogService;
use crate::checkout::CheckoutService;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEventEmitter, NoOpEmitter};
use crate::orders::OrderService;
use crate::profile::ProfileService;
use crate::remote::{HttpRemoteStore, RemoteStore};
use crate::session::SessionManager;

pub struct StorefrontClient {
    config: ClientConfig,
    db: Database,
    session: Arc<SessionManager>,
    cart: Arc<CartManager>,
    checkout: CheckoutService,
    orders: OrderService,
    catalog: CatalogService,
    profile: ProfileService,
    shutdown_tx: Option<mpsc::Sender<()>>,
    watcher: Option<JoinHandle<()>>,
}

impl StorefrontClient {
    pub fn builder(config: ClientConfig) -> StorefrontClientBuilder {
        StorefrontClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn cart(&self) -> &Arc<CartManager> {
        &self.cart
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn profile(&self) -> &ProfileService {
        &self.profile
    }

    /// Route decision for `path` under the current session.
    pub fn access(&self, path: &str) -> AccessDecision {
        self.session.access(path)
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Restores the persisted session, loads its cart and starts reloading
    /// the cart on every identity change. A second call is a no-op.
    pub async fn start(&mut self) -> ClientResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let restored = self.session.restore().await;
        info!(
            user_id = ?restored.as_ref().map(|i| i.id.as_str()),
            "Starting storefront client"
        );

        if let Err(e) = self.cart.load_cart().await {
            warn!(error = %e, "Initial cart load failed");
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.watcher = Some(self.cart.spawn_identity_watch(shutdown_rx));

        info!("Storefront client started");
        Ok(())
    }

    /// Stops background work. The session and its persisted record stay.
    pub async fn shutdown(&mut self) -> ClientResult<()> {
        info!("Shutting down storefront client");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.watcher.take() {
            handle
                .await
                .map_err(|e| ClientError::Internal(format!("Identity watcher failed: {e}")))?;
        }

        info!("Storefront client stopped");
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

pub struct StorefrontClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn RemoteStore>>,
    db: Option<Database>,
    emitter: Option<Arc<dyn ClientEventEmitter>>,
}

impl StorefrontClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        StorefrontClientBuilder {
            config,
            store: None,
            db: None,
            emitter: None,
        }
    }

    /// Sets the remote store (tests pass a `MemoryRemoteStore`).
    pub fn with_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn ClientEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Validates the config and wires every component.
    pub async fn build(self) -> ClientResult<StorefrontClient> {
        let config = self.config;
        config.validate()?;
        let timeout = config.request_timeout();

        let store = match self.store {
            Some(store) => store,
            None => {
                let base_url = Url::parse(&config.api.base_url)
                    .map_err(|e| ClientError::InvalidConfig(format!("api.base_url: {e}")))?;
                let http = HttpRemoteStore::new(base_url, timeout)
                    .map_err(|e| ClientError::InvalidConfig(format!("api.base_url: {e}")))?;
                Arc::new(http) as Arc<dyn RemoteStore>
            }
        };

        let db = match self.db {
            Some(db) => db,
            None => {
                let path = config.database_path().ok_or_else(|| {
                    ClientError::InvalidConfig(
                        "storage.database_path is not set and no data directory was found".into(),
                    )
                })?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| ClientError::Storage(e.to_string()))?;
                }
                Database::new(DbConfig::new(path)).await?
            }
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let session = Arc::new(SessionManager::new(&config, store.clone(), &db, emitter.clone()));
        let cart = Arc::new(CartManager::new(
            store.clone(),
            session.subscribe(),
            emitter,
            timeout,
        ));

        Ok(StorefrontClient {
            checkout: CheckoutService::new(store.clone(), session.clone(), cart.clone(), timeout),
            orders: OrderService::new(store.clone(), session.clone(), timeout),
            catalog: CatalogService::new(store.clone(), session.clone(), timeout),
            profile: ProfileService::new(store, session.clone(), timeout),
            config,
            db,
            session,
            cart,
            shutdown_tx: None,
            watcher: None,
        })
    }
}
