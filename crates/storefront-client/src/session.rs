//! # Session Manager
//!
//! Owns the signed-in Identity: authenticates against the remote store,
//! persists the result in the local database and publishes every change to
//! subscribers (the cart manager among them).
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────────┐   login()    ┌────────────────┐   ok   ┌─────────────┐  │
//! │   │ Anonymous │─────────────►│ Authenticating │───────►│Authenticated│  │
//! │   └───────────┘              └────────────────┘        └─────────────┘  │
//! │        ▲                            │ error                  │          │
//! │        └────────────────────────────┘                        │          │
//! │        ▲                     logout()                        │          │
//! │        └─────────────────────────────────────────────────────┘          │
//! │                                                                         │
//! │   restore(): persisted record ──► verify token ──► Authenticated        │
//! │                    │ absent / corrupt / expired ──► Anonymous (removed) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The persisted record is written before the new Identity is published, so
//! any subscriber that observes a login can also find it on disk.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::access::{guard, AccessDecision, LOGIN_ROUTE};
use storefront_core::validation::validate_registration;
use storefront_core::{Identity, IdentityUpdate, NewAccount, Role, ValidationError};
use storefront_db::{Database, KvRepository};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEventEmitter;
use crate::remote::{with_timeout, RemoteStore};
use crate::token::TokenIssuer;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Marks a login/register call in flight for its lifetime.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        InFlight(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Authenticates, persists and publishes the current Identity.
pub struct SessionManager {
    store: Arc<dyn RemoteStore>,
    kv: KvRepository,
    tokens: TokenIssuer,
    emitter: Arc<dyn ClientEventEmitter>,
    storage_key: String,
    request_timeout: Duration,
    in_flight: AtomicUsize,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl SessionManager {
    /// Creates an anonymous session. Call `restore()` to pick up a persisted
    /// one.
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn RemoteStore>,
        db: &Database,
        emitter: Arc<dyn ClientEventEmitter>,
    ) -> Self {
        let (identity_tx, _) = watch::channel(None);
        SessionManager {
            store,
            kv: db.kv(),
            tokens: TokenIssuer::new(config.session.token_secret.clone(), config.session_ttl()),
            emitter,
            storage_key: config.session.storage_key.clone(),
            request_timeout: config.request_timeout(),
            in_flight: AtomicUsize::new(0),
            identity_tx,
        }
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    pub fn identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity_tx
            .borrow()
            .as_ref()
            .is_some_and(Identity::is_valid)
    }

    /// True while a login or registration call is in flight.
    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn auth_state(&self) -> AuthState {
        if self.loading() {
            AuthState::Authenticating
        } else if self.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }

    /// Receiver that sees every Identity change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    /// The current Identity, or `Unauthorized`.
    pub fn require_identity(&self) -> ClientResult<Identity> {
        self.identity()
            .filter(Identity::is_valid)
            .ok_or(ClientError::Unauthorized)
    }

    /// The current Identity if it holds `role`.
    pub fn require(&self, role: Role) -> ClientResult<Identity> {
        let identity = self.require_identity()?;
        if identity.role != role {
            return Err(ClientError::Forbidden { required: role });
        }
        Ok(identity)
    }

    /// Route decision for `path` under the current session.
    pub fn access(&self, path: &str) -> AccessDecision {
        guard(self.identity().as_ref(), path)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Signs in with email and password.
    ///
    /// Unknown email and wrong password both fail with `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Identity> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::Required {
                field: "email".to_string(),
            }
            .into());
        }
        if password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".to_string(),
            }
            .into());
        }

        let _in_flight = InFlight::enter(&self.in_flight);
        debug!("Login attempt");

        let accounts = with_timeout(
            self.request_timeout,
            self.store.find_accounts_by_email(email),
        )
        .await
        .map_err(ClientError::ServerError)?;

        // Plaintext comparison against the stored record.
        let account = match accounts.into_iter().find(|a| a.email == email) {
            Some(account) if account.password == password => account,
            _ => {
                warn!("Login rejected");
                return Err(ClientError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(&account)?;
        let identity = account.to_identity(token);

        self.persist(&identity).await?;
        self.publish(Some(identity.clone()));

        info!(user_id = %identity.id, role = %identity.role, "Logged in");
        self.emitter.emit_navigation(identity.role.home_route());
        Ok(identity)
    }

    /// Creates a `user` account. Does not sign in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<()> {
        let name = name.trim();
        let email = email.trim();
        validate_registration(name, email, password)?;

        let _in_flight = InFlight::enter(&self.in_flight);
        debug!("Registration attempt");

        if self.email_taken(email).await? {
            warn!("Registration rejected: email already registered");
            return Err(ClientError::Conflict(email.to_string()));
        }

        let account = NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::User,
        };
        let created = with_timeout(self.request_timeout, self.store.create_account(&account))
            .await
            .map_err(ClientError::ServerError)?;

        info!(user_id = %created.id, "Account registered");
        self.emitter.emit_navigation(LOGIN_ROUTE);
        Ok(())
    }

    /// Whether an account exists for `email` (the login form's first step).
    pub async fn email_registered(&self, email: &str) -> ClientResult<bool> {
        self.email_taken(email.trim()).await
    }

    /// Emails match exactly, the same way login and the store's filter do.
    async fn email_taken(&self, email: &str) -> ClientResult<bool> {
        let accounts = with_timeout(
            self.request_timeout,
            self.store.find_accounts_by_email(email),
        )
        .await
        .map_err(ClientError::ServerError)?;
        Ok(accounts.iter().any(|a| a.email == email))
    }

    /// Clears the session. Safe to call while anonymous.
    pub async fn logout(&self) -> ClientResult<()> {
        let previous = self.identity();
        self.publish(None);
        let removed = self.kv.remove(&self.storage_key).await;
        self.emitter.emit_navigation(LOGIN_ROUTE);

        match removed {
            Ok(existed) => {
                info!(
                    user_id = ?previous.as_ref().map(|i| i.id.as_str()),
                    record_removed = existed,
                    "Logged out"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logged out, but the persisted session could not be removed");
                Err(e.into())
            }
        }
    }

    /// Replaces cached profile fields after a successful server-side edit.
    pub async fn update_identity(&self, update: IdentityUpdate) -> ClientResult<Identity> {
        let mut identity = self.require_identity()?;
        identity.apply(&update);

        self.persist(&identity).await?;
        self.publish(Some(identity.clone()));
        info!(user_id = %identity.id, "Identity updated");
        Ok(identity)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Re-reads the persisted record. Never fails: unusable records are
    /// removed and the session becomes anonymous.
    pub async fn restore(&self) -> Option<Identity> {
        match self.read_persisted().await {
            Ok(Some(identity)) => {
                info!(user_id = %identity.id, "Session restored");
                self.publish(Some(identity.clone()));
                Some(identity)
            }
            Ok(None) => {
                debug!("No persisted session");
                self.publish(None);
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted session");
                if let Err(e) = self.kv.remove(&self.storage_key).await {
                    warn!(error = %e, "Failed to remove persisted session");
                }
                self.publish(None);
                None
            }
        }
    }

    /// The persisted Identity, verified.
    pub async fn read_persisted(&self) -> ClientResult<Option<Identity>> {
        let Some(raw) = self.kv.get(&self.storage_key).await? else {
            return Ok(None);
        };

        let identity: Identity = serde_json::from_str(&raw)
            .map_err(|e| ClientError::MalformedPersisted(e.to_string()))?;
        if !identity.is_valid() {
            return Err(ClientError::MalformedPersisted(
                "session token is empty".to_string(),
            ));
        }
        self.tokens.verify(&identity)?;
        Ok(Some(identity))
    }

    async fn persist(&self, identity: &Identity) -> ClientResult<()> {
        let raw = serde_json::to_string(identity)
            .map_err(|e| ClientError::Internal(format!("Failed to encode identity: {e}")))?;
        self.kv.put(&self.storage_key, &raw).await?;
        Ok(())
    }

    /// Notifies subscribers only when the value actually changes.
    fn publish(&self, identity: Option<Identity>) {
        self.identity_tx.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }
}
