use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::domain::cart::CartItem;
use crate::store::{OrderStore, StoreError};

use super::errors::OrderError;
use super::value_objects::{NewOrder, NewOrderItem, Order};

// ============================================================================
// Checkout Coordinator
// ============================================================================
//
// Orchestrates: Cart lines → stock re-validation → one atomic store write
//
// The pre-check against current stock only gives early, precise feedback.
// Correctness rests on the guarded decrement inside place_order: a checkout
// that passes the pre-check can still lose the race and is then rejected
// with InsufficientStock, with nothing written.
//
// Never retries. A blind retry could take stock twice.
//
// ============================================================================

/// Decimal places kept for money; matches the `NUMERIC(12, 2)` columns.
pub const MONEY_SCALE: u32 = 2;

pub struct CheckoutCoordinator {
    store: Arc<dyn OrderStore>,
    timeout: Duration,
}

impl CheckoutCoordinator {
    pub fn new(store: Arc<dyn OrderStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Turn `items` into a persisted order, or fail without side effects.
    ///
    /// The whole operation is bounded by the configured timeout; running out
    /// of time is reported as a persistence failure. The store may already
    /// have committed when the timer fires, so a timed-out checkout has an
    /// unknown outcome: it is not transient and must not be retried blindly.
    /// Look the order up in the customer's history first.
    pub async fn checkout(&self, customer_id: Uuid, items: &[CartItem]) -> Result<Order, OrderError> {
        match tokio::time::timeout(self.timeout, self.run(customer_id, items)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    customer_id = %customer_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Checkout timed out"
                );
                Err(OrderError::Persistence(StoreError::Timeout(self.timeout)))
            }
        }
    }

    async fn run(&self, customer_id: Uuid, items: &[CartItem]) -> Result<Order, OrderError> {
        let new_order = prepare_order(customer_id, items)?;
        let decrements = new_order.stock_decrements();

        let product_ids: Vec<Uuid> = decrements.iter().map(|(id, _)| *id).collect();
        let stock = self.store.stock_levels(&product_ids).await?;

        for (product_id, requested) in &decrements {
            let available = *stock
                .get(product_id)
                .ok_or(OrderError::ProductNotFound(*product_id))?;

            if *requested > available {
                tracing::info!(
                    customer_id = %customer_id,
                    product_id = %product_id,
                    requested = requested,
                    available = available,
                    "Cart is stale, rejecting checkout"
                );
                return Err(OrderError::InsufficientStock {
                    product_id: *product_id,
                    requested: *requested,
                    available,
                });
            }
        }

        let order_id = new_order.id;
        let order = self.store.place_order(new_order).await.map_err(|error| {
            if let StoreError::InsufficientStock { product_id, requested, available } = &error {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    requested = requested,
                    available = available,
                    "Lost stock race, checkout rolled back"
                );
            }
            OrderError::from(error)
        })?;

        tracing::info!(
            order_id = %order.id,
            customer_id = %customer_id,
            line_count = order.items.len(),
            total_amount = %order.total_amount,
            "✅ Order placed"
        );

        Ok(order)
    }
}

/// Build the insert payload: one line per cart entry with its price
/// snapshot, and a header total that is exactly the sum of the lines.
fn prepare_order(customer_id: Uuid, items: &[CartItem]) -> Result<NewOrder, OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    let order_id = Uuid::now_v7();
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        // Round the price once, then derive the line total from it, so the
        // stored lines and header add up exactly at the stored scale.
        let unit_price = item
            .unit_price
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);

        lines.push(NewOrderItem {
            id: Uuid::new_v4(),
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price,
            total_price: unit_price * Decimal::from(item.quantity),
        });
    }

    let total_amount: Decimal = lines.iter().map(|line| line.total_price).sum();

    Ok(NewOrder {
        id: order_id,
        customer_id,
        total_amount,
        created_at: Utc::now(),
        items: lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{CustomerSummary, OrderStatus};
    use crate::models::ProductRecord;
    use crate::store::{InMemoryStore, MockOrderStore};
    use futures_util::future::join_all;
    use std::collections::HashMap;

    struct Shop {
        store: Arc<InMemoryStore>,
        coordinator: CheckoutCoordinator,
        customer_id: Uuid,
        supplier_id: Uuid,
    }

    async fn shop() -> Shop {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = Uuid::new_v4();
        store
            .insert_customer(
                customer_id,
                CustomerSummary {
                    customer_name: "Corner Deli".to_string(),
                    phone: Some("555-0101".to_string()),
                },
            )
            .await;

        Shop {
            coordinator: CheckoutCoordinator::new(store.clone(), Duration::from_secs(5)),
            store,
            customer_id,
            supplier_id: Uuid::new_v4(),
        }
    }

    impl Shop {
        async fn product(&self, price: i64, stock: u32) -> ProductRecord {
            let product = ProductRecord {
                id: Uuid::new_v4(),
                supplier_id: self.supplier_id,
                name: format!("Item at {price}"),
                unit_price: Decimal::from(price),
                stock_quantity: stock,
            };
            self.store.insert_product(product.clone()).await;
            product
        }
    }

    fn line(product: &ProductRecord, quantity: u32) -> CartItem {
        CartItem {
            product_id: product.id,
            supplier_id: product.supplier_id,
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
            available_stock: product.stock_quantity,
        }
    }

    #[tokio::test]
    async fn test_checkout_happy_path() {
        let shop = shop().await;
        let a = shop.product(10, 5).await;
        let b = shop.product(25, 1).await;

        let order = shop
            .coordinator
            .checkout(shop.customer_id, &[line(&a, 3), line(&b, 1)])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, Decimal::from(55));
        assert_eq!(order.total_amount, order.items_total());
        assert_eq!(shop.store.stock_of(a.id).await, Some(2));
        assert_eq!(shop.store.stock_of(b.id).await, Some(0));
    }

    #[tokio::test]
    async fn test_checkout_rejects_stale_cart_without_writing() {
        let shop = shop().await;
        let a = shop.product(10, 5).await;
        let b = shop.product(25, 0).await;

        // Cart was filled while B still had one unit.
        let mut stale_b = line(&b, 1);
        stale_b.available_stock = 1;

        let err = shop
            .coordinator
            .checkout(shop.customer_id, &[line(&a, 3), stale_b])
            .await
            .unwrap_err();

        match err {
            OrderError::InsufficientStock { product_id, requested, available } => {
                assert_eq!(product_id, b.id);
                assert_eq!(requested, 1);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(shop.store.stock_of(a.id).await, Some(5));
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let shop = shop().await;

        let err = shop.coordinator.checkout(shop.customer_id, &[]).await.unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));
    }

    #[tokio::test]
    async fn test_checkout_rejects_zero_quantity_line() {
        let shop = shop().await;
        let a = shop.product(10, 5).await;

        let err = shop
            .coordinator
            .checkout(shop.customer_id, &[line(&a, 0)])
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InvalidQuantity { quantity: 0, .. }));
        assert_eq!(shop.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_checkout_unknown_product() {
        let shop = shop().await;
        let ghost = ProductRecord {
            id: Uuid::new_v4(),
            supplier_id: shop.supplier_id,
            name: "Discontinued".to_string(),
            unit_price: Decimal::ONE,
            stock_quantity: 3,
        };

        let err = shop
            .coordinator
            .checkout(shop.customer_id, &[line(&ghost, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ProductNotFound(id) if id == ghost.id));
    }

    #[tokio::test]
    async fn test_checkout_unknown_customer_is_persistence_error() {
        let shop = shop().await;
        let a = shop.product(10, 5).await;

        let err = shop
            .coordinator
            .checkout(Uuid::new_v4(), &[line(&a, 1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Persistence(StoreError::ConstraintViolation(_))
        ));
        assert_eq!(shop.store.stock_of(a.id).await, Some(5));
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let shop = shop().await;
        let a = shop.product(10, 7).await;
        let coordinator = Arc::new(shop.coordinator);

        let attempts = (0..20).map(|i| {
            let coordinator = coordinator.clone();
            let cart = vec![line(&a, 1 + i % 3)];
            let customer_id = shop.customer_id;
            tokio::spawn(async move { coordinator.checkout(customer_id, &cart).await })
        });

        let mut sold = 0;
        for outcome in join_all(attempts).await {
            match outcome.unwrap() {
                Ok(order) => sold += order.items.iter().map(|i| i.quantity).sum::<u32>(),
                Err(OrderError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let remaining = shop.store.stock_of(a.id).await.unwrap();
        assert!(sold <= 7);
        assert_eq!(sold + remaining, 7);
    }

    #[tokio::test]
    async fn test_last_unit_goes_to_exactly_one_checkout() {
        let shop = shop().await;
        let a = shop.product(10, 1).await;
        let coordinator = Arc::new(shop.coordinator);

        let attempts = (0..8).map(|_| {
            let coordinator = coordinator.clone();
            let cart = vec![line(&a, 1)];
            let customer_id = shop.customer_id;
            tokio::spawn(async move { coordinator.checkout(customer_id, &cart).await })
        });

        let successes = join_all(attempts)
            .await
            .into_iter()
            .filter(|outcome| matches!(outcome, Ok(Ok(_))))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(shop.store.stock_of(a.id).await, Some(0));
        assert_eq!(shop.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_lost_race_surfaces_as_insufficient_stock() {
        let product_id = Uuid::new_v4();
        let mut store = MockOrderStore::new();
        store
            .expect_stock_levels()
            .returning(move |_| Ok(HashMap::from([(product_id, 2)])));
        store.expect_place_order().returning(move |_| {
            Err(StoreError::InsufficientStock {
                product_id,
                requested: 2,
                available: 1,
            })
        });

        let coordinator = CheckoutCoordinator::new(Arc::new(store), Duration::from_secs(1));
        let item = CartItem {
            product_id,
            supplier_id: Uuid::new_v4(),
            name: "Flour 25kg".to_string(),
            unit_price: Decimal::from(30),
            quantity: 2,
            available_stock: 2,
        };

        let err = coordinator.checkout(Uuid::new_v4(), &[item]).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { requested: 2, available: 1, .. }
        ));
    }

    /// Store whose calls never complete.
    struct StalledStore;

    #[async_trait::async_trait]
    impl OrderStore for StalledStore {
        async fn product(&self, _: Uuid) -> Result<ProductRecord, StoreError> {
            futures_util::future::pending().await
        }
        async fn stock_levels(&self, _: &[Uuid]) -> Result<HashMap<Uuid, u32>, StoreError> {
            futures_util::future::pending().await
        }
        async fn place_order(&self, _: NewOrder) -> Result<Order, StoreError> {
            futures_util::future::pending().await
        }
        async fn supplier_order_lines(
            &self,
            _: Uuid,
        ) -> Result<Vec<crate::models::SupplierOrderLine>, StoreError> {
            futures_util::future::pending().await
        }
        async fn customer_order_lines(
            &self,
            _: Uuid,
        ) -> Result<Vec<crate::models::CustomerOrderLine>, StoreError> {
            futures_util::future::pending().await
        }
        async fn order_status(&self, _: Uuid) -> Result<OrderStatus, StoreError> {
            futures_util::future::pending().await
        }
        async fn update_order_status(
            &self,
            _: Uuid,
            _: OrderStatus,
            _: OrderStatus,
        ) -> Result<chrono::DateTime<Utc>, StoreError> {
            futures_util::future::pending().await
        }
        async fn restock(&self, _: Uuid, _: Uuid, _: u32) -> Result<u32, StoreError> {
            futures_util::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_store_times_out_as_persistence_error() {
        let coordinator = CheckoutCoordinator::new(Arc::new(StalledStore), Duration::from_millis(20));
        let item = CartItem {
            product_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            name: "Sugar 50kg".to_string(),
            unit_price: Decimal::from(40),
            quantity: 1,
            available_stock: 5,
        };

        let err = coordinator.checkout(Uuid::new_v4(), &[item]).await.unwrap_err();
        assert!(matches!(err, OrderError::Persistence(StoreError::Timeout(_))));
        // the write may have landed; retrying could place a second order
        assert!(!err.is_transient());
    }

    #[test]
    fn test_prepare_order_totals_match_lines() {
        let product = ProductRecord {
            id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            name: "Rice".to_string(),
            unit_price: Decimal::new(1234, 2),
            stock_quantity: 10,
        };

        let order = prepare_order(Uuid::new_v4(), &[line(&product, 3)]).unwrap();
        assert_eq!(order.items[0].total_price, Decimal::new(3702, 2));
        assert_eq!(order.total_amount, Decimal::new(3702, 2));
    }

    #[test]
    fn test_sub_cent_prices_are_rounded_before_totalling() {
        let half_cent = ProductRecord {
            id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            name: "Paper Clip".to_string(),
            unit_price: Decimal::new(5, 3), // 0.005
            stock_quantity: 10,
        };
        let other = ProductRecord {
            id: Uuid::new_v4(),
            ..half_cent.clone()
        };

        let order = prepare_order(Uuid::new_v4(), &[line(&half_cent, 1), line(&other, 1)]).unwrap();

        for item in &order.items {
            assert_eq!(item.unit_price, Decimal::new(1, 2));
            assert_eq!(item.total_price, Decimal::new(1, 2));
        }
        let lines_total: Decimal = order.items.iter().map(|item| item.total_price).sum();
        assert_eq!(order.total_amount, lines_total);
        assert_eq!(order.total_amount, Decimal::new(2, 2));
        assert!(order.total_amount.scale() <= MONEY_SCALE);
    }

    #[tokio::test]
    async fn test_stored_order_total_matches_lines_for_sub_cent_prices() {
        let shop = shop().await;
        let mut a = shop.product(1, 10).await;
        a.unit_price = Decimal::new(12345, 4); // 1.2345
        let b = shop.product(3, 10).await;

        let order = shop
            .coordinator
            .checkout(shop.customer_id, &[line(&a, 3), line(&b, 1)])
            .await
            .unwrap();

        // 1.23 * 3 + 3
        assert_eq!(order.total_amount, Decimal::new(669, 2));
        assert_eq!(order.total_amount, order.items_total());
    }
}
