//! Reqwest-backed remote store.
//!
//! Owns transport details only: URL building, request timeout, status
//! mapping and JSON decoding.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use storefront_core::{Account, EntityId, NewAccount, Order, OrderStatus, Product, ProductDraft};
use tracing::debug;

use super::{NewCartLine, OrderQuery, RemoteCartLine, RemoteStore};
use crate::error::{StoreError, StoreResult};

const USERS: &str = "users";
const CARTS: &str = "carts";
const PRODUCTS: &str = "products";
const ORDERS: &str = "orders";

/// Remote store reached over HTTP+JSON at one base URL.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpRemoteStore {
    /// Builds a store client with a per-request timeout.
    ///
    /// ```rust,ignore
    /// let store = HttpRemoteStore::new(Url::parse("http://localhost:3001")?, timeout)?;
    /// ```
    pub fn new(base_url: Url, timeout: Duration) -> StoreResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidRequest(format!(
                "base URL cannot carry paths: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        Ok(HttpRemoteStore {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest(format!("bad base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and decodes a JSON body.
    ///
    /// `resource`/`id` name the record for a 404.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
        id: &str,
    ) -> StoreResult<T> {
        let body = self.send(request, resource, id).await?;
        serde_json::from_slice(&body).map_err(|error| {
            StoreError::Decode(format!("invalid {resource} payload: {error}"))
        })
    }

    async fn send(&self, request: RequestBuilder, resource: &str, id: &str) -> StoreResult<Vec<u8>> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;
        debug!(status = status.as_u16(), bytes = body.len(), resource, "Store response");

        if status == StatusCode::NOT_FOUND && !id.is_empty() {
            return Err(StoreError::not_found(resource, id));
        }
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn find_accounts_by_email(&self, email: &str) -> StoreResult<Vec<Account>> {
        let mut url = self.endpoint(&[USERS])?;
        url.query_pairs_mut().append_pair("email", email);
        self.fetch(self.client.get(url), USERS, "").await
    }

    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account> {
        let url = self.endpoint(&[USERS])?;
        self.fetch(self.client.post(url).json(account), USERS, "").await
    }

    async fn get_account(&self, id: &EntityId) -> StoreResult<Account> {
        let url = self.endpoint(&[USERS, id.as_str()])?;
        self.fetch(self.client.get(url), USERS, id.as_str()).await
    }

    async fn replace_account(&self, account: &Account) -> StoreResult<Account> {
        let url = self.endpoint(&[USERS, account.id.as_str()])?;
        self.fetch(self.client.put(url).json(account), USERS, account.id.as_str())
            .await
    }

    async fn list_cart_lines(&self, owner: &EntityId) -> StoreResult<Vec<RemoteCartLine>> {
        let mut url = self.endpoint(&[CARTS])?;
        url.query_pairs_mut()
            .append_pair("userId", owner.as_str())
            .append_pair("_expand", "product");
        self.fetch(self.client.get(url), CARTS, "").await
    }

    async fn create_cart_line(&self, line: &NewCartLine) -> StoreResult<RemoteCartLine> {
        let url = self.endpoint(&[CARTS])?;
        self.fetch(self.client.post(url).json(line), CARTS, "").await
    }

    async fn update_cart_line_quantity(
        &self,
        id: &EntityId,
        quantity: i64,
    ) -> StoreResult<RemoteCartLine> {
        let url = self.endpoint(&[CARTS, id.as_str()])?;
        let body = json!({ "quantity": quantity });
        self.fetch(self.client.patch(url).json(&body), CARTS, id.as_str())
            .await
    }

    async fn delete_cart_line(&self, id: &EntityId) -> StoreResult<()> {
        let url = self.endpoint(&[CARTS, id.as_str()])?;
        self.send(self.client.delete(url), CARTS, id.as_str()).await?;
        Ok(())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let url = self.endpoint(&[PRODUCTS])?;
        self.fetch(self.client.get(url), PRODUCTS, "").await
    }

    async fn get_product(&self, id: &EntityId) -> StoreResult<Product> {
        let url = self.endpoint(&[PRODUCTS, id.as_str()])?;
        self.fetch(self.client.get(url), PRODUCTS, id.as_str()).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> StoreResult<Product> {
        let url = self.endpoint(&[PRODUCTS])?;
        self.fetch(self.client.post(url).json(draft), PRODUCTS, "").await
    }

    async fn replace_product(&self, id: &EntityId, draft: &ProductDraft) -> StoreResult<Product> {
        let url = self.endpoint(&[PRODUCTS, id.as_str()])?;
        self.fetch(self.client.put(url).json(draft), PRODUCTS, id.as_str())
            .await
    }

    async fn delete_product(&self, id: &EntityId) -> StoreResult<()> {
        let url = self.endpoint(&[PRODUCTS, id.as_str()])?;
        self.send(self.client.delete(url), PRODUCTS, id.as_str()).await?;
        Ok(())
    }

    async fn list_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let url = orders_url(self.endpoint(&[ORDERS])?, query);
        self.fetch(self.client.get(url), ORDERS, "").await
    }

    async fn create_order(&self, order: &Order) -> StoreResult<Order> {
        let url = self.endpoint(&[ORDERS])?;
        self.fetch(self.client.post(url).json(order), ORDERS, "").await
    }

    async fn update_order_status(
        &self,
        id: &EntityId,
        status: OrderStatus,
    ) -> StoreResult<Order> {
        let url = self.endpoint(&[ORDERS, id.as_str()])?;
        let body = json!({ "status": status });
        self.fetch(self.client.patch(url).json(&body), ORDERS, id.as_str())
            .await
    }
}

fn orders_url(mut url: Url, query: &OrderQuery) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        if let Some(user_id) = &query.user_id {
            pairs.append_pair("userId", user_id.as_str());
        }
        if query.newest_first {
            pairs.append_pair("_sort", "date").append_pair("_order", "desc");
        }
    }
    // an empty `?` is left behind when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }
    url
}

fn map_transport_error(error: reqwest::Error, timeout: Duration) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(timeout)
    } else {
        StoreError::Transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> StoreError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no reason")
            .to_string()
    } else {
        preview
    };
    StoreError::Status {
        status: status.as_u16(),
        message,
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
