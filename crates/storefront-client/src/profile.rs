//! Own-account profile: read the stored account and save edits.
//!
//! A successful save is mirrored into the session so the cached Identity
//! (and its persisted record) shows the new name and email.

use std::sync::Arc;
use std::time::Duration;
use storefront_core::validation::{validate_email, validate_name, validate_password};
use storefront_core::{Account, AccountUpdate};
use tracing::info;

use crate::error::ClientResult;
use crate::remote::{with_timeout, RemoteStore};
use crate::session::SessionManager;

pub struct ProfileService {
    store: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    request_timeout: Duration,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<SessionManager>,
        request_timeout: Duration,
    ) -> Self {
        ProfileService {
            store,
            session,
            request_timeout,
        }
    }

    /// The signed-in user's account record.
    pub async fn load(&self) -> ClientResult<Account> {
        let identity = self.session.require_identity()?;
        Ok(with_timeout(self.request_timeout, self.store.get_account(&identity.id)).await?)
    }

    /// Applies `update` to the stored account. Unset fields are kept.
    pub async fn save(&self, update: AccountUpdate) -> ClientResult<Account> {
        let identity = self.session.require_identity()?;
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        let current = with_timeout(self.request_timeout, self.store.get_account(&identity.id)).await?;
        let saved = with_timeout(
            self.request_timeout,
            self.store.replace_account(&current.updated(&update)),
        )
        .await?;
        info!(user_id = %saved.id, "Profile saved");

        self.session.update_identity(update.identity_update()).await?;
        Ok(saved)
    }
}
