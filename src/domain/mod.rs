// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - cart: the customer's pre-checkout selection, local to one session
// - order: checkout, per-supplier projections and the status lifecycle
//
// Store access goes through crate::store::OrderStore only.
//
// ============================================================================

pub mod cart;
pub mod order;
