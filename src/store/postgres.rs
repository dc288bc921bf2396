use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{query, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use crate::domain::order::{
    CustomerSummary, NewOrder, Order, OrderItem, OrderStatus, ParseStatusError,
};
use crate::models::{CustomerOrderLine, ProductRecord, SupplierOrderLine};

use super::{OrderStore, StoreError};

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const UPSERT_CUSTOMER_SQL: &str = include_str!("sql/upsert_customer.sql");
const UPSERT_PRODUCT_SQL: &str = include_str!("sql/upsert_product.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const GET_STOCK_LEVELS_SQL: &str = include_str!("sql/get_stock_levels.sql");
const GET_STOCK_SQL: &str = include_str!("sql/get_stock.sql");
const DECREMENT_STOCK_SQL: &str = include_str!("sql/decrement_stock.sql");
const INSERT_ORDER_SQL: &str = include_str!("sql/insert_order.sql");
const INSERT_ORDER_ITEM_SQL: &str = include_str!("sql/insert_order_item.sql");
const GET_ORDER_ITEMS_SQL: &str = include_str!("sql/get_order_items.sql");
const SUPPLIER_ORDER_LINES_SQL: &str = include_str!("sql/supplier_order_lines.sql");
const CUSTOMER_ORDER_LINES_SQL: &str = include_str!("sql/customer_order_lines.sql");
const GET_ORDER_STATUS_SQL: &str = include_str!("sql/get_order_status.sql");
const UPDATE_ORDER_STATUS_SQL: &str = include_str!("sql/update_order_status.sql");
const RESTOCK_SQL: &str = include_str!("sql/restock.sql");

// ============================================================================
// PostgreSQL Record Store
// ============================================================================
//
// Stock is only ever decremented through a guarded UPDATE
// (stock_quantity >= requested) inside the checkout transaction, so two
// checkouts racing for the last unit cannot both commit.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(classify)?;

        Ok(Self::new(pool))
    }

    /// Create the tables the engine reads and writes, if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        tracing::info!("Order store schema ready");
        Ok(())
    }

    pub async fn upsert_customer(
        &self,
        customer_id: Uuid,
        customer: &CustomerSummary,
    ) -> Result<(), StoreError> {
        query(UPSERT_CUSTOMER_SQL)
            .bind(customer_id)
            .bind(&customer.customer_name)
            .bind(&customer.phone)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(())
    }

    pub async fn upsert_product(&self, product: &ProductRecord) -> Result<(), StoreError> {
        query(UPSERT_PRODUCT_SQL)
            .bind(product.id)
            .bind(product.supplier_id)
            .bind(&product.name)
            .bind(product.unit_price)
            .bind(to_db_int(product.stock_quantity)?)
            .execute(&self.pool)
            .await
            .map_err(classify)?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn product(&self, product_id: Uuid) -> Result<ProductRecord, StoreError> {
        query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn stock_levels(&self, product_ids: &[Uuid]) -> Result<HashMap<Uuid, u32>, StoreError> {
        let rows = query(GET_STOCK_LEVELS_SQL)
            .bind(product_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get("id")?;
                Ok((id, try_get_quantity(row, "stock_quantity")?))
            })
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()
            .map_err(classify)
    }

    async fn place_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Lock rows in a stable order so concurrent checkouts cannot deadlock.
        let mut decrements = order.stock_decrements();
        decrements.sort_by_key(|(product_id, _)| *product_id);

        for (product_id, requested) in decrements {
            let remaining = query(DECREMENT_STOCK_SQL)
                .bind(product_id)
                .bind(to_db_int(requested)?)
                .fetch_optional(&mut *tx)
                .await
                .map_err(classify)?;

            if remaining.is_some() {
                continue;
            }

            let current = query(GET_STOCK_SQL)
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(classify)?;
            tx.rollback().await.map_err(classify)?;

            return match current {
                None => Err(StoreError::ProductNotFound(product_id)),
                Some(row) => Err(StoreError::InsufficientStock {
                    product_id,
                    requested,
                    available: try_get_quantity(&row, "stock_quantity").map_err(classify)?,
                }),
            };
        }

        let header = query(INSERT_ORDER_SQL)
            .bind(order.id)
            .bind(order.customer_id)
            .bind(order.total_amount)
            .bind(order.created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

        for (position, line) in order.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                StoreError::ConstraintViolation(format!("order {} has too many lines", order.id))
            })?;

            query(INSERT_ORDER_ITEM_SQL)
                .bind(line.id)
                .bind(order.id)
                .bind(position)
                .bind(line.product_id)
                .bind(to_db_int(line.quantity)?)
                .bind(line.unit_price)
                .bind(line.total_price)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        let items = query_as::<Postgres, OrderItem>(GET_ORDER_ITEMS_SQL)
            .bind(order.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        Ok(Order {
            id: header.try_get("id").map_err(classify)?,
            customer_id: header.try_get("customer_id").map_err(classify)?,
            status: try_get_status(&header, "status").map_err(classify)?,
            total_amount: header.try_get("total_amount").map_err(classify)?,
            created_at: header.try_get("created_at").map_err(classify)?,
            updated_at: header.try_get("updated_at").map_err(classify)?,
            items,
        })
    }

    async fn supplier_order_lines(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<SupplierOrderLine>, StoreError> {
        query_as::<Postgres, SupplierOrderLine>(SUPPLIER_ORDER_LINES_SQL)
            .bind(supplier_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn customer_order_lines(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<CustomerOrderLine>, StoreError> {
        query_as::<Postgres, CustomerOrderLine>(CUSTOMER_ORDER_LINES_SQL)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)
    }

    async fn order_status(&self, order_id: Uuid) -> Result<OrderStatus, StoreError> {
        let row = query(GET_ORDER_STATUS_SQL)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        try_get_status(&row, "status").map_err(classify)
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<DateTime<Utc>, StoreError> {
        let updated = query(UPDATE_ORDER_STATUS_SQL)
            .bind(order_id)
            .bind(status.as_str())
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        match updated {
            Some(row) => row.try_get("updated_at").map_err(classify),
            // No row: either the order is gone or its status moved on.
            None => Err(StoreError::StatusConflict {
                order_id,
                expected,
                actual: self.order_status(order_id).await?,
            }),
        }
    }

    async fn restock(
        &self,
        supplier_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let row = query(RESTOCK_SQL)
            .bind(product_id)
            .bind(supplier_id)
            .bind(to_db_int(quantity)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(StoreError::ProductNotFound(product_id))?;

        try_get_quantity(&row, "stock_quantity").map_err(classify)
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            supplier_id: row.try_get("supplier_id")?,
            name: row.try_get("name")?,
            unit_price: row.try_get("selling_price")?,
            stock_quantity: try_get_quantity(row, "stock_quantity")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            supplier_id: row.try_get("supplier_id")?,
            product_name: row.try_get("product_name")?,
            quantity: try_get_quantity(row, "quantity")?,
            unit_price: row.try_get("unit_price")?,
            total_price: row.try_get("total_price")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for SupplierOrderLine {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let customer_name: Option<String> = row.try_get("customer_name")?;
        let phone: Option<String> = row.try_get("phone")?;

        Ok(Self {
            order_id: row.try_get("order_id")?,
            order_status: try_get_status(row, "order_status")?,
            order_total: row.try_get("order_total")?,
            order_created_at: row.try_get("order_created_at")?,
            customer: customer_name.map(|customer_name| CustomerSummary {
                customer_name,
                phone,
            }),
            item: OrderItem::from_row(row)?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CustomerOrderLine {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            order_id: row.try_get("order_id")?,
            customer_id: row.try_get("customer_id")?,
            order_status: try_get_status(row, "order_status")?,
            order_total: row.try_get("order_total")?,
            order_created_at: row.try_get("order_created_at")?,
            order_updated_at: row.try_get("order_updated_at")?,
            item: OrderItem::from_row(row)?,
        })
    }
}

fn try_get_quantity(row: &PgRow, col: &str) -> Result<u32, sqlx::Error> {
    let value: i32 = row.try_get(col)?;

    u32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

fn try_get_status(row: &PgRow, col: &str) -> Result<OrderStatus, sqlx::Error> {
    let value: String = row.try_get(col)?;

    value
        .parse::<OrderStatus>()
        .map_err(|e: ParseStatusError| sqlx::Error::ColumnDecode {
            index: col.to_string(),
            source: Box::new(e),
        })
}

fn to_db_int(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation(format!("{value} exceeds INTEGER range")))
}

/// Map driver errors onto the store taxonomy.
fn classify(error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_foreign_key_violation() || db.is_check_violation() || db.is_unique_violation() {
            return StoreError::ConstraintViolation(db.message().to_string());
        }
    }

    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(error.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::CorruptRecord(error.to_string())
        }
        other => StoreError::Database(other),
    }
}
