//! # Cart
//!
//! The pure cart collection: an ordered list of lines owned by one account.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Invariants                                  │
//! │                                                                         │
//! │  1. One line per (owner, product)   push() rejects a second line,       │
//! │                                     callers increment() instead         │
//! │  2. quantity >= 1                   set_quantity(0) removes the line    │
//! │  3. quantity <= MAX_ITEM_QUANTITY   larger values are rejected          │
//! │  4. Every line's owner == cart owner                                    │
//! │  5. Order is stable                 rekey() replaces an id in place     │
//! │                                                                         │
//! │  Derived, never stored:  item_count = Σ quantity                        │
//! │                          total_price = Σ price × quantity               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here talks to the network. The optimistic/rollback machinery that
//! drives these operations lives in `storefront-client`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{EntityId, Product, ProductSnapshot};
use crate::MAX_ITEM_QUANTITY;

/// Prefix of locally generated line ids.
pub const TEMP_LINE_PREFIX: &str = "tmp-";

// =============================================================================
// Line Id
// =============================================================================

/// Key of a cart line: a local placeholder until the store confirms the
/// create, then the store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LineId {
    Temporary(String),
    Remote(EntityId),
}

impl LineId {
    /// A fresh `tmp-<uuid>` id.
    pub fn temporary() -> Self {
        LineId::Temporary(format!("{}{}", TEMP_LINE_PREFIX, Uuid::new_v4()))
    }

    pub fn remote(id: impl Into<EntityId>) -> Self {
        LineId::Remote(id.into())
    }

    /// Classifies user-supplied text (e.g. a CLI argument).
    pub fn parse(text: &str) -> Self {
        if text.starts_with(TEMP_LINE_PREFIX) {
            LineId::Temporary(text.to_string())
        } else {
            LineId::Remote(EntityId::from(text))
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, LineId::Temporary(_))
    }

    pub fn as_remote(&self) -> Option<&EntityId> {
        match self {
            LineId::Remote(id) => Some(id),
            LineId::Temporary(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LineId::Temporary(s) => s,
            LineId::Remote(id) => id.as_str(),
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LineId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LineId::Temporary(s) => serializer.serialize_str(s),
            LineId::Remote(id) => id.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LineId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = EntityId::deserialize(deserializer)?;
        if id.as_str().starts_with(TEMP_LINE_PREFIX) {
            return Err(de::Error::custom("temporary line ids are never stored"));
        }
        Ok(LineId::Remote(id))
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One product with quantity in the owner's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub line_id: LineId,
    pub owner_id: EntityId,
    pub product_id: EntityId,
    pub quantity: i64,
    pub product: ProductSnapshot,
}

impl CartLine {
    /// A quantity-1 line under a fresh temporary id.
    pub fn pending(owner_id: EntityId, product: &Product) -> Self {
        CartLine {
            line_id: LineId::temporary(),
            owner_id,
            product_id: product.id.clone(),
            quantity: 1,
            product: ProductSnapshot::from(product),
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.product.price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart of one owner (or of nobody while anonymous).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    owner: Option<EntityId>,
    lines: Vec<CartLine>,
}

impl Cart {
    /// Empty, ownerless cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Empty cart for `owner`.
    pub fn for_owner(owner: EntityId) -> Self {
        Cart {
            owner: Some(owner),
            lines: Vec::new(),
        }
    }

    /// Builds a cart from fetched lines, enforcing the invariants.
    ///
    /// Lines of another owner, lines with quantity < 1 and second lines for an
    /// already-seen product are returned separately instead of being kept.
    pub fn from_lines(owner: EntityId, lines: Vec<CartLine>) -> (Cart, Vec<CartLine>) {
        let mut cart = Cart::for_owner(owner);
        let mut rejected = Vec::new();
        for line in lines {
            if line.quantity < 1 {
                rejected.push(line);
                continue;
            }
            if cart.push(line.clone()).is_err() {
                rejected.push(line);
            }
        }
        (cart, rejected)
    }

    pub fn owner(&self) -> Option<&EntityId> {
        self.owner.as_ref()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn find(&self, line_id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.line_id == line_id)
    }

    pub fn find_by_product(&self, product_id: &EntityId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    fn position(&self, line_id: &LineId) -> CoreResult<usize> {
        self.lines
            .iter()
            .position(|l| &l.line_id == line_id)
            .ok_or_else(|| CoreError::LineNotFound(line_id.to_string()))
    }

    /// Appends a new line.
    pub fn push(&mut self, line: CartLine) -> CoreResult<()> {
        if let Some(owner) = &self.owner {
            if &line.owner_id != owner {
                return Err(CoreError::ForeignLine {
                    line_owner: line.owner_id.to_string(),
                    cart_owner: owner.to_string(),
                });
            }
        }
        if self.find_by_product(&line.product_id).is_some() {
            return Err(CoreError::DuplicateLine {
                product_id: line.product_id.to_string(),
            });
        }
        check_quantity(line.quantity)?;
        self.lines.push(line);
        Ok(())
    }

    /// Adds `by` to a line's quantity and returns the new quantity.
    pub fn increment(&mut self, line_id: &LineId, by: i64) -> CoreResult<i64> {
        let idx = self.position(line_id)?;
        let new_qty = self.lines[idx].quantity + by;
        if new_qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: new_qty,
                max: MAX_ITEM_QUANTITY,
            });
        }
        if new_qty < 1 {
            self.lines.remove(idx);
            return Ok(0);
        }
        self.lines[idx].quantity = new_qty;
        Ok(new_qty)
    }

    /// Rewrites a line's quantity. Zero removes the line.
    pub fn set_quantity(&mut self, line_id: &LineId, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(line_id).map(|_| ());
        }
        check_quantity(quantity)?;
        let idx = self.position(line_id)?;
        self.lines[idx].quantity = quantity;
        Ok(())
    }

    /// Removes a line and returns it.
    pub fn remove(&mut self, line_id: &LineId) -> CoreResult<CartLine> {
        let idx = self.position(line_id)?;
        Ok(self.lines.remove(idx))
    }

    /// Replaces a line's id in place, keeping its position.
    pub fn rekey(&mut self, from: &LineId, to: LineId) -> CoreResult<()> {
        let idx = self.position(from)?;
        self.lines[idx].line_id = to;
        Ok(())
    }

    /// Drops every line and hands the cart to `owner`.
    pub fn clear_for(&mut self, owner: Option<EntityId>) {
        self.lines.clear();
        self.owner = owner;
    }

    /// Sum of quantities across lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Σ price × quantity.
    pub fn total_price(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    if quantity < 1 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        }
        .into());
    }
    Ok(())
}

// =============================================================================
// Totals
// =============================================================================

/// Cart totals summary for consumers (nav badge, cart page).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub line_count: usize,
    pub item_count: i64,
    pub total_price: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.len(),
            item_count: cart.item_count(),
            total_price: cart.total_price(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
