use uuid::Uuid;

// ============================================================================
// Cart Validation Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("Quantity must be at least 1 for product {0}")]
    ZeroQuantity(Uuid),

    #[error("Requested {requested} of product {product_id} but only {available} in stock")]
    ExceedsStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Product {0} is not in the cart")]
    ItemNotFound(Uuid),
}
