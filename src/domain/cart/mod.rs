// ============================================================================
// Cart Domain - pre-checkout selection of a customer
// ============================================================================
//
// Purely local: nothing here touches the store. Stock figures held by the
// cart are snapshots and are re-validated at checkout.
//
// ============================================================================

pub mod cart;
pub mod errors;
pub mod session;

pub use cart::*;
pub use errors::*;
pub use session::*;
