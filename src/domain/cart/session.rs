use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::cart::Cart;

// ============================================================================
// Customer Session
// ============================================================================
//
// Owns the cart for as long as the customer session lives. Created when the
// customer signs in and dropped on sign-out; the cart dies with it.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct CustomerSession {
    pub customer_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub cart: Cart,
}

impl CustomerSession {
    pub fn new(customer_id: Uuid) -> Self {
        Self {
            customer_id,
            started_at: Utc::now(),
            cart: Cart::new(),
        }
    }
}
