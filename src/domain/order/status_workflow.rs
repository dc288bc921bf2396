use std::sync::Arc;

use uuid::Uuid;

use crate::store::OrderStore;

use super::customer_view::CustomerOrderView;
use super::errors::OrderError;
use super::supplier_view::SupplierOrderView;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Status Workflow
// ============================================================================
//
// Two ways to change an order's status:
//
// - set_status: against a caller-held view. The transition is validated from
//   the view's status, applied to the view before the store write, and undone
//   from a captured snapshot if the write fails.
// - set_stored_status: no view. The transition is validated from the status
//   currently in the store.
//
// The write is guarded by the status the transition was validated from, so
// of two writers racing on the same order the first one wins and the other
// gets StatusConflict. A stale view therefore can never move a terminal
// order. Rollback only repairs the view of the caller whose write failed;
// other readers that already saw the optimistic value are not notified.
//
// ============================================================================

/// A caller-held projection carrying an order's status.
pub trait StatusView {
    fn order_id(&self) -> Uuid;
    fn status(&self) -> OrderStatus;
    fn set_status(&mut self, status: OrderStatus);
}

impl StatusView for SupplierOrderView {
    fn order_id(&self) -> Uuid {
        self.order_id
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

impl StatusView for CustomerOrderView {
    fn order_id(&self) -> Uuid {
        self.order_id
    }

    fn status(&self) -> OrderStatus {
        self.status
    }

    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

/// Pending optimistic change: the view as it was, and the status wanted.
///
/// `rollback` writes the captured snapshot back verbatim; nothing is
/// recomputed from the current view.
#[derive(Debug, Clone)]
pub struct StatusChange<V> {
    snapshot: V,
    desired: OrderStatus,
}

impl<V: StatusView + Clone> StatusChange<V> {
    pub fn capture(view: &V, desired: OrderStatus) -> Self {
        Self {
            snapshot: view.clone(),
            desired,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.snapshot.order_id()
    }

    pub fn previous(&self) -> OrderStatus {
        self.snapshot.status()
    }

    pub fn desired(&self) -> OrderStatus {
        self.desired
    }

    pub fn apply(&self, view: &mut V) {
        view.set_status(self.desired);
    }

    pub fn rollback(self, view: &mut V) {
        *view = self.snapshot;
    }
}

pub struct OrderStatusWorkflow {
    store: Arc<dyn OrderStore>,
}

impl OrderStatusWorkflow {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Optimistically move `order_id` to `new_status` inside `views`.
    ///
    /// On an illegal transition nothing is touched. On a failed write,
    /// including a stored status that no longer matches the view, the view
    /// is restored from its snapshot and the error is returned.
    /// Returns the status the view held before the change.
    pub async fn set_status<V>(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        views: &mut [V],
    ) -> Result<OrderStatus, OrderError>
    where
        V: StatusView + Clone + Send,
    {
        let view = views
            .iter_mut()
            .find(|view| view.order_id() == order_id)
            .ok_or(OrderError::OrderNotFound(order_id))?;

        view.status().transition_to(new_status)?;

        let change = StatusChange::capture(view, new_status);
        change.apply(view);

        match self
            .store
            .update_order_status(order_id, change.previous(), new_status)
            .await
        {
            Ok(_) => {
                tracing::info!(
                    order_id = %order_id,
                    from = %change.previous(),
                    to = %change.desired(),
                    "✅ Order status updated"
                );
                Ok(change.previous())
            }
            Err(e) => {
                let from = change.previous();
                change.rollback(view);
                tracing::warn!(
                    order_id = %order_id,
                    restored = %from,
                    error = %e,
                    "Status write failed, view rolled back"
                );
                Err(e.into())
            }
        }
    }

    /// Move `order_id` to `new_status`, validated against the stored status.
    ///
    /// Returns the previous status.
    pub async fn set_stored_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderStatus, OrderError> {
        let current = self.store.order_status(order_id).await?;
        current.transition_to(new_status)?;

        self.store
            .update_order_status(order_id, current, new_status)
            .await?;

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %new_status,
            "✅ Order status updated"
        );
        Ok(current)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
