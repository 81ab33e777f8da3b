//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storefront_client::{ClientConfig, MemoryRemoteStore, RecordingEmitter, StorefrontClient};
use storefront_core::{Account, Identity, Money, Product, Role};
use storefront_db::{Database, DbConfig};

pub const SECRET: &str = "integration-test-secret";

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.session.token_secret = SECRET.to_string();
    config.api.request_timeout_ms = 2_000;
    config
}

pub struct Harness {
    pub store: MemoryRemoteStore,
    pub db: Database,
    pub emitter: Arc<RecordingEmitter>,
    pub client: StorefrontClient,
}

impl Harness {
    pub async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::with_parts(MemoryRemoteStore::new(), db).await
    }

    /// A client over an existing store and database.
    pub async fn with_parts(store: MemoryRemoteStore, db: Database) -> Self {
        let emitter = Arc::new(RecordingEmitter::new());
        let client = StorefrontClient::builder(test_config())
            .with_store(Arc::new(store.clone()))
            .with_database(db.clone())
            .with_emitter(emitter.clone())
            .build()
            .await
            .unwrap();
        Harness {
            store,
            db,
            emitter,
            client,
        }
    }

    pub async fn user(&self, name: &str, email: &str) -> Account {
        self.store.add_account(name, email, "pw1234", Role::User).await
    }

    pub async fn admin(&self) -> Account {
        self.store
            .add_account("Root", "root@example.com", "pw1234", Role::Admin)
            .await
    }

    pub async fn product(&self, title: &str, cents: i64) -> Product {
        self.store.add_product(title, Money::from_cents(cents)).await
    }

    pub async fn login(&self, account: &Account) -> Identity {
        self.client
            .session()
            .login(&account.email, "pw1234")
            .await
            .unwrap()
    }

    /// Signs in and loads the cart.
    pub async fn shop_as(&self, account: &Account) -> Identity {
        let identity = self.login(account).await;
        self.client.cart().load_cart().await.unwrap();
        identity
    }
}

/// Polls `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}
