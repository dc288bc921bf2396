use uuid::Uuid;

use crate::domain::cart::CartError;
use crate::store::StoreError;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot check out an empty cart")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: u32 },

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The caller's view is stale: the stored status moved on before the
    /// write landed.
    #[error("Order {order_id} is already {actual}, not {expected}")]
    StatusConflict {
        order_id: Uuid,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Cart rejected the change: {0}")]
    Cart(#[from] CartError),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),
}

impl OrderError {
    /// Only store-level failures are worth retrying; every other variant
    /// describes a state that a retry would reproduce.
    ///
    /// A timeout is not transient: it can fire after the store already
    /// committed, so the outcome is unknown and a retried checkout could
    /// place the order twice. Re-read instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderError::Persistence(error) if !matches!(error, StoreError::Timeout(_)))
    }

    /// Short stable name, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::EmptyCart => "empty_cart",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::StatusConflict { .. } => "status_conflict",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::Cart(_) => "cart",
            OrderError::Persistence(StoreError::Timeout(_)) => "timeout",
            OrderError::Persistence(_) => "persistence",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderNotFound(id) => OrderError::OrderNotFound(id),
            StoreError::StatusConflict {
                order_id,
                expected,
                actual,
            } => OrderError::StatusConflict {
                order_id,
                expected,
                actual,
            },
            StoreError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            other => OrderError::Persistence(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown order status: {0:?}")]
pub struct ParseStatusError(pub String);
