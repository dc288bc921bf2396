use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::ProductSnapshot;
use crate::domain::order::{CustomerSummary, OrderItem, OrderStatus};

// ============================================================================
// Store Records
// ============================================================================
//
// Row shapes handed out by the record store. Order lines come back flat, one
// row per line, with the parent order's header fields copied onto each row;
// the projections in domain::order turn them back into per-order aggregates.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProductRecord {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub stock_quantity: u32,
}

impl ProductRecord {
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            supplier_id: self.supplier_id,
            name: self.name.clone(),
            unit_price: self.unit_price,
            available_stock: self.stock_quantity,
        }
    }
}

/// One order line visible to a supplier, with its order header denormalized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SupplierOrderLine {
    pub order_id: Uuid,
    pub order_status: OrderStatus,
    pub order_total: Decimal,
    pub order_created_at: DateTime<Utc>,
    pub customer: Option<CustomerSummary>,
    pub item: OrderItem,
}

/// One line of a customer's own order, with its order header denormalized.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CustomerOrderLine {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub order_status: OrderStatus,
    pub order_total: Decimal,
    pub order_created_at: DateTime<Utc>,
    pub order_updated_at: DateTime<Utc>,
    pub item: OrderItem,
}
