use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::cart::{CustomerSession, ProductSnapshot};
use crate::domain::order::{
    build_customer_views, build_supplier_views, filter_supplier_views, CheckoutCoordinator,
    CustomerOrderView, Order, OrderError, OrderStatus, OrderStatusWorkflow, StatusView,
    SupplierOrderView,
};
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// Ordering Service - caller-facing operations
// ============================================================================
//
// Thin facade over the domain components. Owns the store handle, records
// metrics, and keeps the cart rules of the session: a cart is cleared after a
// successful checkout and left untouched after any failure.
//
// Nothing here retries. Callers decide which reads are worth retrying.
//
// ============================================================================

pub struct OrderingService {
    store: Arc<dyn OrderStore>,
    checkout: CheckoutCoordinator,
    workflow: OrderStatusWorkflow,
    metrics: Arc<Metrics>,
}

impl OrderingService {
    pub fn new(store: Arc<dyn OrderStore>, checkout_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            checkout: CheckoutCoordinator::new(store.clone(), checkout_timeout),
            workflow: OrderStatusWorkflow::new(store.clone()),
            store,
            metrics,
        }
    }

    pub fn open_session(&self, customer_id: Uuid) -> CustomerSession {
        tracing::debug!(customer_id = %customer_id, "Customer session opened");
        CustomerSession::new(customer_id)
    }

    /// Current price and stock of a product, as a cart would capture it.
    pub async fn product_snapshot(&self, product_id: Uuid) -> Result<ProductSnapshot, OrderError> {
        Ok(self.store.product(product_id).await?.snapshot())
    }

    /// Put `quantity` units of a product into the session's cart, checked
    /// against the product's stock right now.
    pub async fn add_to_cart(
        &self,
        session: &mut CustomerSession,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<(), OrderError> {
        let product = self.product_snapshot(product_id).await?;
        session.cart.add(&product, quantity)?;

        if product.is_low_stock() {
            tracing::debug!(
                product_id = %product_id,
                available = product.available_stock,
                "Low stock product added to cart"
            );
        }
        Ok(())
    }

    /// Check out the session's cart. The cart is cleared only on success.
    pub async fn checkout(&self, session: &mut CustomerSession) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self
            .checkout
            .checkout(session.customer_id, session.cart.items())
            .await;

        self.metrics
            .record_checkout(started.elapsed().as_secs_f64(), result.as_ref().err());

        if result.is_ok() {
            session.cart.clear();
        }
        result
    }

    /// Orders containing `supplier_id`'s products, newest first, each reduced
    /// to that supplier's lines. `search` narrows by customer or product name.
    pub async fn list_supplier_orders(
        &self,
        supplier_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<SupplierOrderView>, OrderError> {
        let lines = self.store.supplier_order_lines(supplier_id).await?;
        let views = filter_supplier_views(build_supplier_views(supplier_id, &lines), search);

        self.metrics.record_supplier_views(views.len());
        tracing::debug!(
            supplier_id = %supplier_id,
            line_count = lines.len(),
            view_count = views.len(),
            "Supplier order views built"
        );
        Ok(views)
    }

    /// A customer's own orders with every line, newest first.
    pub async fn list_customer_orders(&self, customer_id: Uuid) -> Result<Vec<CustomerOrderView>, OrderError> {
        let lines = self.store.customer_order_lines(customer_id).await?;
        Ok(build_customer_views(customer_id, &lines))
    }

    /// Change an order's status as stored. Returns the previous status.
    pub async fn set_order_status(&self, order_id: Uuid, new_status: OrderStatus) -> Result<OrderStatus, OrderError> {
        let result = self.workflow.set_stored_status(order_id, new_status).await;

        let from = match &result {
            Ok(previous) => Some(*previous),
            Err(OrderError::InvalidTransition { from, .. }) => Some(*from),
            Err(OrderError::StatusConflict { expected, .. }) => Some(*expected),
            Err(_) => None,
        };
        self.metrics
            .record_status_change(from, new_status, result.as_ref().err());

        result
    }

    /// Change an order's status inside caller-held `views`, optimistically.
    ///
    /// See [`OrderStatusWorkflow::set_status`] for the rollback rules.
    pub async fn set_order_status_optimistic<V>(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        views: &mut [V],
    ) -> Result<OrderStatus, OrderError>
    where
        V: StatusView + Clone + Send,
    {
        let from = views
            .iter()
            .find(|view| view.order_id() == order_id)
            .map(|view| view.status());

        let result = self.workflow.set_status(order_id, new_status, views).await;

        self.metrics
            .record_status_change(from, new_status, result.as_ref().err());

        let applied_then_undone = result.is_err() && from.is_some_and(|status| status.can_transition_to(new_status));
        if applied_then_undone {
            self.metrics.record_status_rollback();
        }

        result
    }

    /// Add stock to one of `supplier_id`'s products. Returns the new level.
    pub async fn restock(&self, supplier_id: Uuid, product_id: Uuid, quantity: u32) -> Result<u32, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { product_id, quantity });
        }

        let level = self.store.restock(supplier_id, product_id, quantity).await?;

        tracing::info!(
            supplier_id = %supplier_id,
            product_id = %product_id,
            added = quantity,
            stock = level,
            "📦 Product restocked"
        );
        Ok(level)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::CustomerSummary;
    use crate::models::ProductRecord;
    use crate::store::{InMemoryStore, MockOrderStore, StoreError};
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<InMemoryStore>,
        metrics: Arc<Metrics>,
        service: OrderingService,
        customer_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let customer_id = Uuid::new_v4();
        store
            .insert_customer(
                customer_id,
                CustomerSummary {
                    customer_name: "Greenway Grocers".to_string(),
                    phone: None,
                },
            )
            .await;

        Fixture {
            service: OrderingService::new(store.clone(), Duration::from_secs(5), metrics.clone()),
            store,
            metrics,
            customer_id,
        }
    }

    impl Fixture {
        async fn product(&self, supplier_id: Uuid, name: &str, price: i64, stock: u32) -> Uuid {
            let id = Uuid::new_v4();
            self.store
                .insert_product(ProductRecord {
                    id,
                    supplier_id,
                    name: name.to_string(),
                    unit_price: Decimal::from(price),
                    stock_quantity: stock,
                })
                .await;
            id
        }

        fn counter(&self, name: &str) -> f64 {
            self.metrics
                .registry()
                .gather()
                .iter()
                .filter(|m| m.name() == name)
                .flat_map(|m| m.metric.iter())
                .filter_map(|metric| metric.counter.value)
                .sum()
        }
    }

    #[tokio::test]
    async fn test_checkout_scenario_clears_cart() {
        let f = fixture().await;
        let supplier = Uuid::new_v4();
        let a = f.product(supplier, "Basmati Rice", 10, 5).await;
        let b = f.product(supplier, "Saffron", 25, 1).await;

        let mut session = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut session, a, 3).await.unwrap();
        f.service.add_to_cart(&mut session, b, 1).await.unwrap();

        let order = f.service.checkout(&mut session).await.unwrap();

        assert_eq!(order.total_amount, Decimal::from(55));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(f.store.stock_of(a).await, Some(2));
        assert_eq!(f.store.stock_of(b).await, Some(0));
        assert!(session.cart.is_empty());
        assert_eq!(f.counter("checkouts_total"), 1.0);
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let f = fixture().await;
        let supplier = Uuid::new_v4();
        let a = f.product(supplier, "Basmati Rice", 10, 5).await;
        let b = f.product(supplier, "Saffron", 25, 1).await;

        let mut session = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut session, a, 3).await.unwrap();
        f.service.add_to_cart(&mut session, b, 1).await.unwrap();

        // someone else takes the last saffron first
        let mut rival = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut rival, b, 1).await.unwrap();
        f.service.checkout(&mut rival).await.unwrap();

        let err = f.service.checkout(&mut session).await.unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock { product_id, requested: 1, available: 0 } if product_id == b
        ));
        assert_eq!(session.cart.line_count(), 2);
        assert_eq!(f.store.stock_of(a).await, Some(5));
        assert_eq!(f.store.order_count().await, 1);
        assert_eq!(f.counter("stock_conflicts_total"), 1.0);
    }

    #[tokio::test]
    async fn test_add_to_cart_rejects_more_than_stock() {
        let f = fixture().await;
        let a = f.product(Uuid::new_v4(), "Capers", 3, 2).await;
        let mut session = f.service.open_session(f.customer_id);

        let err = f.service.add_to_cart(&mut session, a, 3).await.unwrap_err();

        assert!(matches!(err, OrderError::Cart(_)));
        assert!(session.cart.is_empty());
    }

    #[tokio::test]
    async fn test_supplier_views_split_mixed_order() {
        let f = fixture().await;
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let flour = f.product(x, "Flour", 10, 10).await;
        let sugar = f.product(x, "Sugar", 5, 10).await;
        let yeast = f.product(y, "Yeast", 15, 10).await;

        let mut session = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut session, flour, 2).await.unwrap();
        f.service.add_to_cart(&mut session, yeast, 1).await.unwrap();
        f.service.add_to_cart(&mut session, sugar, 4).await.unwrap();
        let order = f.service.checkout(&mut session).await.unwrap();
        assert_eq!(order.total_amount, Decimal::from(55));

        let x_views = f.service.list_supplier_orders(x, None).await.unwrap();
        assert_eq!(x_views.len(), 1);
        assert_eq!(x_views[0].items.len(), 2);
        assert_eq!(x_views[0].supplier_subtotal, Decimal::from(40));
        assert_eq!(
            x_views[0].customer.as_ref().map(|c| c.customer_name.as_str()),
            Some("Greenway Grocers")
        );

        let y_views = f.service.list_supplier_orders(y, None).await.unwrap();
        assert_eq!(y_views[0].items.len(), 1);
        assert_eq!(y_views[0].supplier_subtotal, Decimal::from(15));

        let searched = f.service.list_supplier_orders(x, Some("yeast")).await.unwrap();
        assert!(searched.is_empty());
        assert_eq!(f.counter("supplier_views_built_total"), 2.0);
    }

    #[tokio::test]
    async fn test_customer_history_shows_whole_order() {
        let f = fixture().await;
        let flour = f.product(Uuid::new_v4(), "Flour", 10, 10).await;
        let yeast = f.product(Uuid::new_v4(), "Yeast", 15, 10).await;

        let mut session = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut session, flour, 1).await.unwrap();
        f.service.add_to_cart(&mut session, yeast, 1).await.unwrap();
        let order = f.service.checkout(&mut session).await.unwrap();

        let history = f.service.list_customer_orders(f.customer_id).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, order.id);
        assert_eq!(history[0].items.len(), 2);
        assert_eq!(history[0].total_amount, Decimal::from(25));
    }

    #[tokio::test]
    async fn test_status_lifecycle_through_service() {
        let f = fixture().await;
        let supplier = Uuid::new_v4();
        let flour = f.product(supplier, "Flour", 10, 10).await;
        let mut session = f.service.open_session(f.customer_id);
        f.service.add_to_cart(&mut session, flour, 1).await.unwrap();
        let order = f.service.checkout(&mut session).await.unwrap();

        let mut views = f.service.list_supplier_orders(supplier, None).await.unwrap();
        let previous = f
            .service
            .set_order_status_optimistic(order.id, OrderStatus::Confirmed, &mut views)
            .await
            .unwrap();
        assert_eq!(previous, OrderStatus::Pending);
        assert_eq!(views[0].status, OrderStatus::Confirmed);

        let previous = f.service.set_order_status(order.id, OrderStatus::Shipped).await.unwrap();
        assert_eq!(previous, OrderStatus::Confirmed);

        let err = f
            .service
            .set_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled }
        ));
        assert_eq!(f.store.order_status(order.id).await.unwrap(), OrderStatus::Shipped);
        assert_eq!(f.counter("status_changes_total"), 3.0);
    }

    #[tokio::test]
    async fn test_failed_optimistic_write_counts_rollback() {
        let mut store = MockOrderStore::new();
        store
            .expect_update_order_status()
            .returning(|_, _, _| Err(StoreError::Unavailable("primary down".to_string())));
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderingService::new(Arc::new(store), Duration::from_secs(1), metrics.clone());

        let order_id = Uuid::new_v4();
        let mut views = vec![CustomerOrderView {
            order_id,
            status: OrderStatus::Confirmed,
            total_amount: Decimal::from(12),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            items: Vec::new(),
        }];
        let before = views.clone();

        let err = service
            .set_order_status_optimistic(order_id, OrderStatus::Shipped, &mut views)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(views, before);
        let rollbacks = metrics
            .registry()
            .gather()
            .iter()
            .find(|m| m.name() == "status_rollbacks_total")
            .and_then(|m| m.metric.first().and_then(|metric| metric.counter.value));
        assert_eq!(rollbacks, Some(1.0));
    }

    #[tokio::test]
    async fn test_restock_own_product_only() {
        let f = fixture().await;
        let owner = Uuid::new_v4();
        let capers = f.product(owner, "Capers", 3, 2).await;

        assert_eq!(f.service.restock(owner, capers, 8).await.unwrap(), 10);
        assert_eq!(f.store.stock_of(capers).await, Some(10));

        let err = f.service.restock(Uuid::new_v4(), capers, 1).await.unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound(_)));

        let err = f.service.restock(owner, capers, 0).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidQuantity { quantity: 0, .. }));
        assert_eq!(f.store.stock_of(capers).await, Some(10));
    }

    #[tokio::test]
    async fn test_product_snapshot_flags_low_stock() {
        let f = fixture().await;
        let capers = f.product(Uuid::new_v4(), "Capers", 3, 4).await;

        let snapshot = f.service.product_snapshot(capers).await.unwrap();

        assert_eq!(snapshot.available_stock, 4);
        assert!(snapshot.is_low_stock());
    }
}
