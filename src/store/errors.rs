use std::time::Duration;

use uuid::Uuid;

use crate::domain::order::OrderStatus;

// ============================================================================
// Store Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A guarded decrement found less stock than requested at write time.
    #[error(
        "Stock changed for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    /// A guarded status write found the order in a different status.
    #[error("Order {order_id} is {actual}, expected {expected}")]
    StatusConflict {
        order_id: Uuid,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}
