use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::CustomerOrderLine;

use super::grouping::group_by_order;
use super::value_objects::{OrderItem, OrderStatus};

/// One of a customer's own orders, with every line and the full total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrderView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl CustomerOrderView {
    pub fn supplier_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for item in &self.items {
            if !ids.contains(&item.supplier_id) {
                ids.push(item.supplier_id);
            }
        }
        ids
    }
}

/// Order history for `customer_id`, newest first.
pub fn build_customer_views(customer_id: Uuid, lines: &[CustomerOrderLine]) -> Vec<CustomerOrderView> {
    let mut views = group_by_order(
        lines.iter().filter(|line| line.customer_id == customer_id),
        |line: &CustomerOrderLine| line.order_id,
        |line: &CustomerOrderLine| CustomerOrderView {
            order_id: line.order_id,
            status: line.order_status,
            total_amount: line.order_total,
            created_at: line.order_created_at,
            updated_at: line.order_updated_at,
            items: Vec::new(),
        },
        |view: &mut CustomerOrderView, line: &CustomerOrderLine| view.items.push(line.item.clone()),
    );

    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    views
}
