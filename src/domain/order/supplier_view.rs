use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SupplierOrderLine;

use super::grouping::group_by_order;
use super::value_objects::{CustomerSummary, OrderItem, OrderStatus};

// ============================================================================
// Supplier Order Views
// ============================================================================
//
// Projection: flat SupplierOrderLine rows → one view per order, per supplier
//
// Lines of other suppliers are dropped BEFORE grouping, so a mixed order shows
// up for each supplier with only that supplier's lines and a subtotal over
// those lines alone. The order's global total is not carried into the view.
//
// ============================================================================

/// One order as seen by a single supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOrderView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub customer: Option<CustomerSummary>,
    pub items: Vec<OrderItem>,
    pub supplier_subtotal: Decimal,
}

impl SupplierOrderView {
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Case-insensitive match on the customer name or any product name.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let customer_hit = self
            .customer
            .as_ref()
            .is_some_and(|customer| customer.customer_name.to_lowercase().contains(&needle));

        customer_hit
            || self
                .items
                .iter()
                .any(|item| item.product_name.to_lowercase().contains(&needle))
    }
}

/// Build `supplier_id`'s views from raw line rows, newest order first.
///
/// Rows belonging to other suppliers are ignored. Orders with equal
/// `created_at` keep the order in which they first appeared in `lines`.
pub fn build_supplier_views(supplier_id: Uuid, lines: &[SupplierOrderLine]) -> Vec<SupplierOrderView> {
    let mut views = group_by_order(
        lines.iter().filter(|line| line.item.supplier_id == supplier_id),
        |line: &SupplierOrderLine| line.order_id,
        |line: &SupplierOrderLine| SupplierOrderView {
            order_id: line.order_id,
            status: line.order_status,
            created_at: line.order_created_at,
            customer: line.customer.clone(),
            items: Vec::new(),
            supplier_subtotal: Decimal::ZERO,
        },
        |view: &mut SupplierOrderView, line: &SupplierOrderLine| {
            view.supplier_subtotal += line.item.total_price;
            view.items.push(line.item.clone());
        },
    );

    // sort_by is stable
    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    views
}

/// Keep the views matching `search`; an empty or blank search keeps all.
pub fn filter_supplier_views(views: Vec<SupplierOrderView>, search: Option<&str>) -> Vec<SupplierOrderView> {
    match search {
        Some(needle) => views.into_iter().filter(|view| view.matches(needle)).collect(),
        None => views,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
