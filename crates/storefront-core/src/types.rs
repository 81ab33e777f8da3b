//! # Domain Types
//!
//! Core domain types shared by the session and cart managers.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    Account      │   │    Identity     │   │    Product      │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id             │──►│  id             │   │  id             │        │
//! │  │  name, email    │   │  name, email    │   │  title, price   │        │
//! │  │  password       │   │  role           │   │  image, rating  │        │
//! │  │  role           │   │  session_token  │   │  category       │        │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘        │
//! │   (remote record)       (held client-side)            │ snapshot        │
//! │                                                       ▼                 │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │      Role       │   │   OrderStatus   │   │ ProductSnapshot │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  User           │   │  Pending        │   │  id, title      │        │
//! │  │  Admin          │   │  Shipped        │   │  price, image   │        │
//! │  └─────────────────┘   │  Delivered      │   └─────────────────┘        │
//! │                        │  Completed      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shapes
//! Field names follow the remote store's camelCase JSON (`userId`,
//! `productId`). Record ids arrive as JSON numbers or strings and are held as
//! [`EntityId`].

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::cart::CartLine;
use crate::error::ValidationError;
use crate::money::{self, Money};

// =============================================================================
// Entity Id
// =============================================================================

/// Identifier of a remote record (account, product, cart line, order).
///
/// The store assigns numeric ids but nothing guarantees it, so ids are kept as
/// text. Numeric-looking ids serialize back as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn as_number(&self) -> Option<u64> {
        let n: u64 = self.0.parse().ok()?;
        (n.to_string() == self.0).then_some(n)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id.to_string())
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = EntityId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
                Ok(EntityId::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
                Ok(EntityId(v.to_string()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
                if v.is_empty() {
                    return Err(E::custom("id must not be empty"));
                }
                Ok(EntityId::from(v))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

// =============================================================================
// Role
// =============================================================================

/// The closed set of account roles.
///
/// Unknown role strings are rejected at deserialization, so a record carrying
/// `"role": "superuser"` never becomes an Identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Landing route for this role after login, and the redirect target
    /// when the role wanders into the other role's area.
    pub fn home_route(&self) -> &'static str {
        match self {
            Role::User => "/shop",
            Role::Admin => "/admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["user".to_string(), "admin".to_string()],
            }),
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// The signed-in actor as held by the client.
///
/// This is also the persisted record shape: `{id, name, email, role, token}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "token")]
    pub session_token: String,
}

impl Identity {
    /// An Identity is only usable with a non-empty session token.
    pub fn is_valid(&self) -> bool {
        !self.session_token.is_empty()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Applies a profile change without touching id, role or token.
    pub fn apply(&mut self, update: &IdentityUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = email.clone();
        }
    }
}

/// Partial change to the cached Identity after a profile edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

// =============================================================================
// Account
// =============================================================================

/// A user record as stored remotely.
///
/// The password is compared as stored; see DESIGN.md for why this stays
/// flagged rather than fixed on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl Account {
    /// Builds the client-side Identity, dropping the password.
    pub fn to_identity(&self, session_token: String) -> Identity {
        Identity {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            session_token,
        }
    }

    /// Returns a copy with `update` applied; unset fields keep their value.
    pub fn updated(&self, update: &AccountUpdate) -> Account {
        Account {
            id: self.id.clone(),
            name: update.name.clone().unwrap_or_else(|| self.name.clone()),
            email: update.email.clone().unwrap_or_else(|| self.email.clone()),
            password: update
                .password
                .clone()
                .unwrap_or_else(|| self.password.clone()),
            role: self.role,
        }
    }
}

/// Body of an account create call. Role is always `user` for sign-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Partial profile change. A `None` password keeps the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl AccountUpdate {
    pub fn identity_update(&self) -> IdentityUpdate {
        IdentityUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// Customer rating summary shown on product cards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rate: f64,
    pub count: u32,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    pub title: String,
    /// Missing prices count as zero.
    #[serde(default, with = "money::decimal")]
    pub price: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl Product {
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot::from(self)
    }
}

/// Body of a product create/replace call (admin only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub title: String,
    #[serde(with = "money::decimal")]
    pub price: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: String,
}

/// The denormalized product data a cart line carries for display and
/// price computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: EntityId,
    pub title: String,
    #[serde(default, with = "money::decimal")]
    pub price: Money,
    #[serde(default)]
    pub image: String,
}

impl From<&Product> for ProductSnapshot {
    fn from(product: &Product) -> Self {
        ProductSnapshot {
            id: product.id.clone(),
            title: product.title.clone(),
            price: product.price,
            image: product.image.clone(),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Fulfilment status of an order. New orders start as Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Completed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![
                    "Pending".to_string(),
                    "Shipped".to_string(),
                    "Delivered".to_string(),
                    "Completed".to_string(),
                ],
            }),
        }
    }
}

/// A checkout-time snapshot of one cart line.
///
/// `price` is the line total (unit price × quantity) at the time of checkout.
/// `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub user_id: EntityId,
    pub product_id: EntityId,
    pub title: String,
    #[serde(with = "money::decimal")]
    pub price: Money,
    /// Records placed without a quantity count as one item.
    #[serde(default = "default_order_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
}

fn default_order_quantity() -> i64 {
    1
}

impl Order {
    /// Snapshot of a cart line at checkout: line total, status Pending.
    pub fn from_line(line: &CartLine, now: DateTime<Utc>) -> Order {
        Order {
            id: None,
            user_id: line.owner_id.clone(),
            product_id: line.product_id.clone(),
            title: line.product.title.clone(),
            price: line.line_total(),
            quantity: line.quantity,
            status: OrderStatus::Pending,
            date: now,
        }
    }

    /// A single unit of `product` bought directly, bypassing the cart.
    pub fn from_product(user_id: EntityId, product: &Product, now: DateTime<Utc>) -> Order {
        Order {
            id: None,
            user_id,
            product_id: product.id.clone(),
            title: product.title.clone(),
            price: product.price,
            quantity: 1,
            status: OrderStatus::Pending,
            date: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_accepts_numbers_and_strings() {
        let id: EntityId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(id.as_str(), "7");

        let id: EntityId = serde_json::from_value(json!("a1b2")).unwrap();
        assert_eq!(id.as_str(), "a1b2");

        assert!(serde_json::from_value::<EntityId>(json!("")).is_err());
        assert!(serde_json::from_value::<EntityId>(json!(null)).is_err());
    }

    #[test]
    fn test_entity_id_serializes_numeric_ids_as_numbers() {
        assert_eq!(serde_json::to_value(EntityId::from(7u64)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(EntityId::from("007")).unwrap(), json!("007"));
        assert_eq!(serde_json::to_value(EntityId::from("x9")).unwrap(), json!("x9"));
    }

    #[test]
    fn test_role_is_closed() {
        let role: Role = serde_json::from_value(json!("admin")).unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_value::<Role>(json!("superuser")).is_err());
        assert!(serde_json::from_value::<Role>(json!("Admin")).is_err());
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_home_routes() {
        assert_eq!(Role::User.home_route(), "/shop");
        assert_eq!(Role::Admin.home_route(), "/admin");
    }

    #[test]
    fn test_identity_persisted_shape() {
        let identity = Identity {
            id: EntityId::from(3u64),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::User,
            session_token: "tok".to_string(),
        };
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["token"], json!("tok"));
        assert_eq!(value["role"], json!("user"));
        assert_eq!(value["id"], json!(3));

        let back: Identity = serde_json::from_value(value).unwrap();
        assert_eq!(back, identity);
        assert!(back.is_valid());
    }

    #[test]
    fn test_account_to_identity_drops_password() {
        let account: Account = serde_json::from_value(json!({
            "id": 1, "name": "Ada", "email": "ada@example.com",
            "password": "pw1234", "role": "admin"
        }))
        .unwrap();
        let identity = account.to_identity("t".to_string());
        let value = serde_json::to_value(&identity).unwrap();
        assert!(value.get("password").is_none());
        assert!(identity.is_admin());
    }

    #[test]
    fn test_account_update_keeps_unset_fields() {
        let account = Account {
            id: EntityId::from(1u64),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "old-pass".to_string(),
            role: Role::User,
        };
        let update = AccountUpdate {
            name: Some("Ada L".to_string()),
            ..Default::default()
        };
        let updated = account.updated(&update);
        assert_eq!(updated.name, "Ada L");
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.password, "old-pass");
    }

    #[test]
    fn test_order_from_line_uses_line_total() {
        let product: Product = serde_json::from_value(json!({
            "id": 7, "title": "Backpack", "price": 9.99
        }))
        .unwrap();
        let mut line = CartLine::pending(EntityId::from(3u64), &product);
        line.quantity = 3;

        let now = Utc::now();
        let order = Order::from_line(&line, now);
        assert_eq!(order.id, None);
        assert_eq!(order.price.cents(), 2997);
        assert_eq!(order.quantity, 3);
        assert_eq!(order.status, OrderStatus::Pending);

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["userId"], json!(3));
        assert_eq!(value["productId"], json!(7));
        assert_eq!(value["price"], json!(29.97));
        assert_eq!(value["status"], json!("Pending"));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_order_from_product_is_one_unit() {
        let product: Product = serde_json::from_value(json!({
            "id": 7, "title": "Backpack", "price": 9.99
        }))
        .unwrap();

        let order = Order::from_product(EntityId::from(3u64), &product, Utc::now());
        assert_eq!(order.price.cents(), 999);
        assert_eq!(order.quantity, 1);
        assert_eq!(order.product_id, product.id);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_order_without_quantity_reads_as_one() {
        let order: Order = serde_json::from_value(json!({
            "id": 4, "userId": 3, "productId": 7, "title": "Backpack",
            "price": 9.99, "status": "Pending", "date": "2025-01-02T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(order.quantity, 1);
        assert_eq!(order.price.cents(), 999);
    }

    #[test]
    fn test_product_decimal_price_and_defaults() {
        let product: Product = serde_json::from_value(json!({
            "id": 7, "title": "Backpack", "price": 109.95,
            "rating": {"rate": 3.9, "count": 120}
        }))
        .unwrap();
        assert_eq!(product.price.cents(), 10995);
        assert_eq!(product.description, "");
        assert_eq!(product.rating.map(|r| r.count), Some(120));

        let no_price: Product = serde_json::from_value(json!({"id": 8, "title": "Free"})).unwrap();
        assert!(no_price.price.is_zero());
    }

    #[test]
    fn test_order_wire_shape() {
        let order = Order {
            id: None,
            user_id: EntityId::from(1u64),
            product_id: EntityId::from(7u64),
            title: "Backpack".to_string(),
            price: Money::from_cents(1998),
            quantity: 2,
            status: OrderStatus::Pending,
            date: Utc::now(),
        };
        let value = serde_json::to_value(&order).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["userId"], json!(1));
        assert_eq!(value["price"], json!(19.98));
        assert_eq!(value["status"], json!("Pending"));
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("Delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }
}
