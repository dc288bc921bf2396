// ============================================================================
// Record Store - persistence seam of the fulfillment engine
// ============================================================================
//
// Two implementations:
// - InMemoryStore: one mutex around all tables, so every call is one atomic unit
// - PgStore: PostgreSQL via sqlx, one transaction per checkout
//
// place_order is the only multi-row write. It must insert the header, every
// line and apply every guarded stock decrement, or leave nothing behind.
//
// ============================================================================

mod errors;
mod memory;
mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::order::{NewOrder, Order, OrderStatus};
use crate::models::{CustomerOrderLine, ProductRecord, SupplierOrderLine};

pub use errors::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Current state of one product.
    async fn product(&self, product_id: Uuid) -> Result<ProductRecord, StoreError>;

    /// Current stock for each known product; unknown ids are left out.
    async fn stock_levels(&self, product_ids: &[Uuid]) -> Result<HashMap<Uuid, u32>, StoreError>;

    /// Write header, lines and guarded stock decrements atomically.
    ///
    /// A decrement that finds less stock than requested fails the whole unit
    /// with [`StoreError::InsufficientStock`].
    async fn place_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Every line whose product belongs to `supplier_id`, header fields
    /// denormalized onto each line.
    async fn supplier_order_lines(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierOrderLine>, StoreError>;

    /// Every line of every order placed by `customer_id`.
    async fn customer_order_lines(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerOrderLine>, StoreError>;

    async fn order_status(&self, order_id: Uuid) -> Result<OrderStatus, StoreError>;

    /// Guarded status write: applied only while the stored status is still
    /// `expected`, otherwise [`StoreError::StatusConflict`] with the stored
    /// status.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<DateTime<Utc>, StoreError>;

    /// Add stock to a product owned by `supplier_id`; returns the new level.
    async fn restock(
        &self,
        supplier_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<u32, StoreError>;
}
