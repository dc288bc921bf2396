use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::order::{CustomerSummary, NewOrder, Order, OrderItem, OrderStatus};
use crate::models::{CustomerOrderLine, ProductRecord, SupplierOrderLine};

use super::{OrderStore, StoreError};

// ============================================================================
// In-Memory Record Store
// ============================================================================
//
// All tables sit behind a single async mutex. Holding the lock for the whole
// of place_order makes check-and-decrement one indivisible step, which is the
// same guarantee PgStore gets from its guarded UPDATE inside a transaction.
//
// ============================================================================

#[derive(Debug, Clone)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    status: OrderStatus,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<Uuid, ProductRecord>,
    customers: HashMap<Uuid, CustomerSummary>,
    orders: Vec<OrderRow>,
    items: Vec<OrderItem>,
}

impl Tables {
    fn order(&self, order_id: Uuid) -> Option<&OrderRow> {
        self.orders.iter().find(|order| order.id == order_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: ProductRecord) {
        self.tables.lock().await.products.insert(product.id, product);
    }

    pub async fn insert_customer(&self, customer_id: Uuid, customer: CustomerSummary) {
        self.tables.lock().await.customers.insert(customer_id, customer);
    }

    pub async fn stock_of(&self, product_id: Uuid) -> Option<u32> {
        self.tables
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|product| product.stock_quantity)
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn item_count(&self) -> usize {
        self.tables.lock().await.items.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn product(&self, product_id: Uuid) -> Result<ProductRecord, StoreError> {
        self.tables
            .lock()
            .await
            .products
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn stock_levels(&self, product_ids: &[Uuid]) -> Result<HashMap<Uuid, u32>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(product_ids
            .iter()
            .filter_map(|id| tables.products.get(id).map(|p| (*id, p.stock_quantity)))
            .collect())
    }

    async fn place_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.customers.contains_key(&order.customer_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "orders.customer_id references unknown customer {}",
                order.customer_id
            )));
        }
        if tables.order(order.id).is_some() {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate order id {}",
                order.id
            )));
        }

        // Check every guard before touching anything.
        let decrements = order.stock_decrements();
        for (product_id, requested) in &decrements {
            let product = tables
                .products
                .get(product_id)
                .ok_or(StoreError::ProductNotFound(*product_id))?;

            if product.stock_quantity < *requested {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *requested,
                    available: product.stock_quantity,
                });
            }
        }

        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let product = tables
                .products
                .get(&line.product_id)
                .ok_or(StoreError::ProductNotFound(line.product_id))?;

            items.push(OrderItem {
                id: line.id,
                order_id: order.id,
                product_id: line.product_id,
                supplier_id: product.supplier_id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price,
            });
        }

        for (product_id, requested) in &decrements {
            if let Some(product) = tables.products.get_mut(product_id) {
                product.stock_quantity -= requested;
            }
        }

        let row = OrderRow {
            id: order.id,
            customer_id: order.customer_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        tables.orders.push(row.clone());
        tables.items.extend(items.iter().cloned());

        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            status: row.status,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
            items,
        })
    }

    async fn supplier_order_lines(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierOrderLine>, StoreError> {
        let tables = self.tables.lock().await;
        let mut lines = Vec::new();

        for item in &tables.items {
            let owned = tables
                .products
                .get(&item.product_id)
                .is_some_and(|product| product.supplier_id == supplier_id);
            if !owned {
                continue;
            }

            let order = tables
                .order(item.order_id)
                .ok_or(StoreError::OrderNotFound(item.order_id))?;

            lines.push(SupplierOrderLine {
                order_id: order.id,
                order_status: order.status,
                order_total: order.total_amount,
                order_created_at: order.created_at,
                customer: tables.customers.get(&order.customer_id).cloned(),
                item: item.clone(),
            });
        }

        Ok(lines)
    }

    async fn customer_order_lines(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerOrderLine>, StoreError> {
        let tables = self.tables.lock().await;
        let mut lines = Vec::new();

        for order in tables.orders.iter().filter(|o| o.customer_id == customer_id) {
            for item in tables.items.iter().filter(|i| i.order_id == order.id) {
                lines.push(CustomerOrderLine {
                    order_id: order.id,
                    customer_id: order.customer_id,
                    order_status: order.status,
                    order_total: order.total_amount,
                    order_created_at: order.created_at,
                    order_updated_at: order.updated_at,
                    item: item.clone(),
                });
            }
        }

        Ok(lines)
    }

    async fn order_status(&self, order_id: Uuid) -> Result<OrderStatus, StoreError> {
        self.tables
            .lock()
            .await
            .order(order_id)
            .map(|order| order.status)
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<DateTime<Utc>, StoreError> {
        let mut tables = self.tables.lock().await;
        let order = tables
            .orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.status != expected {
            return Err(StoreError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.updated_at)
    }

    async fn restock(
        &self,
        supplier_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let mut tables = self.tables.lock().await;
        let product = tables
            .products
            .get_mut(&product_id)
            .filter(|product| product.supplier_id == supplier_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        product.stock_quantity = product.stock_quantity.checked_add(quantity).ok_or_else(|| {
            StoreError::ConstraintViolation(format!("stock overflow for product {product_id}"))
        })?;
        Ok(product.stock_quantity)
    }
}
