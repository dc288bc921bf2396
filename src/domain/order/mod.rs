// ============================================================================
// Order Domain - checkout, supplier projections and status lifecycle
// ============================================================================
//
// - Value objects (Order, OrderItem, OrderStatus)
// - Errors (OrderError enum)
// - CheckoutCoordinator: cart → one atomic order write
// - Supplier and customer views: flat line rows → per-order projections
// - OrderStatusWorkflow: transition table plus optimistic update/rollback
//
// ============================================================================

pub mod checkout;
pub mod customer_view;
pub mod errors;
mod grouping;
pub mod status_workflow;
pub mod supplier_view;
pub mod value_objects;

// Re-export for convenience
pub use checkout::*;
pub use customer_view::*;
pub use errors::*;
pub use status_workflow::*;
pub use supplier_view::*;
pub use value_objects::*;
