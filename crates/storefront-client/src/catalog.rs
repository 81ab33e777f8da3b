//! Product catalog. Reads are open to everyone, writes need the admin role.

use std::sync::Arc;
use std::time::Duration;
use storefront_core::validation::validate_name;
use storefront_core::{EntityId, Product, ProductDraft, Role, ValidationError};
use tracing::{debug, info};

use crate::error::ClientResult;
use crate::remote::{with_timeout, RemoteStore};
use crate::session::SessionManager;

pub struct CatalogService {
    store: Arc<dyn RemoteStore>,
    session: Arc<SessionManager>,
    request_timeout: Duration,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        session: Arc<SessionManager>,
        request_timeout: Duration,
    ) -> Self {
        CatalogService {
            store,
            session,
            request_timeout,
        }
    }

    pub async fn list_products(&self) -> ClientResult<Vec<Product>> {
        let products = with_timeout(self.request_timeout, self.store.list_products()).await?;
        debug!(count = products.len(), "Products listed");
        Ok(products)
    }

    pub async fn get_product(&self, id: &EntityId) -> ClientResult<Product> {
        Ok(with_timeout(self.request_timeout, self.store.get_product(id)).await?)
    }

    pub async fn create_product(&self, draft: &ProductDraft) -> ClientResult<Product> {
        self.session.require(Role::Admin)?;
        validate_draft(draft)?;
        let product = with_timeout(self.request_timeout, self.store.create_product(draft)).await?;
        info!(product_id = %product.id, title = %product.title, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, id: &EntityId, draft: &ProductDraft) -> ClientResult<Product> {
        self.session.require(Role::Admin)?;
        validate_draft(draft)?;
        let product = with_timeout(self.request_timeout, self.store.replace_product(id, draft)).await?;
        info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Cart lines that still point at the product are left alone; the next
    /// cart load drops them.
    pub async fn delete_product(&self, id: &EntityId) -> ClientResult<()> {
        self.session.require(Role::Admin)?;
        with_timeout(self.request_timeout, self.store.delete_product(id)).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }
}

fn validate_draft(draft: &ProductDraft) -> Result<(), ValidationError> {
    validate_name(draft.title.trim()).map_err(|e| match e {
        ValidationError::Required { .. } => ValidationError::Required {
            field: "title".to_string(),
        },
        ValidationError::TooLong { max, .. } => ValidationError::TooLong {
            field: "title".to_string(),
            max,
        },
        other => other,
    })?;
    if draft.price.cents() < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}
