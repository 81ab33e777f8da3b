//! # Dashboard Statistics
//!
//! Aggregates for the admin dashboard, computed from the product and order
//! collections.
//!
//! ```text
//! products ──┐
//!            ├──► counts, 5 newest orders, orders per category, orders per day
//! orders ────┘
//! ```
//!
//! Orders whose product is gone or has no category are counted under
//! [`OTHER_CATEGORY`]. Days are UTC calendar dates.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::types::{EntityId, Order, Product};

/// How many orders the "recent" list keeps.
pub const RECENT_ORDER_LIMIT: usize = 5;

/// Bucket for orders without a known category.
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub day: NaiveDate,
    pub orders: usize,
}

/// Everything the admin dashboard shows apart from the charts themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_products: usize,
    pub total_orders: usize,
    /// Newest first.
    pub recent_orders: Vec<Order>,
    /// Sorted by category name.
    pub orders_by_category: Vec<CategoryCount>,
    /// Sorted by day, oldest first.
    pub orders_by_day: Vec<DayCount>,
}

impl DashboardStats {
    pub fn compute(products: &[Product], orders: &[Order]) -> Self {
        let categories: HashMap<&EntityId, &str> = products
            .iter()
            .map(|p| (&p.id, p.category.trim()))
            .collect();

        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for order in orders {
            let category = match categories.get(&order.product_id) {
                Some(c) if !c.is_empty() => *c,
                _ => OTHER_CATEGORY,
            };
            *by_category.entry(category.to_string()).or_default() += 1;
            *by_day.entry(order.date.date_naive()).or_default() += 1;
        }

        let mut recent_orders = orders.to_vec();
        recent_orders.sort_by(|a, b| b.date.cmp(&a.date));
        recent_orders.truncate(RECENT_ORDER_LIMIT);

        DashboardStats {
            total_products: products.len(),
            total_orders: orders.len(),
            recent_orders,
            orders_by_category: by_category
                .into_iter()
                .map(|(category, orders)| CategoryCount { category, orders })
                .collect(),
            orders_by_day: by_day
                .into_iter()
                .map(|(day, orders)| DayCount { day, orders })
                .collect(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
