use std::sync::Arc;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use order_fulfillment::config::AppConfig;
use order_fulfillment::domain::order::{CustomerSummary, OrderError, OrderStatus};
use order_fulfillment::metrics::{self, Metrics};
use order_fulfillment::models::ProductRecord;
use order_fulfillment::service::OrderingService;
use order_fulfillment::store::{InMemoryStore, OrderStore, PgStore};
use order_fulfillment::utils::{retry_on_transient, RetryConfig};

/// Demo catalog: two suppliers sharing one customer.
struct Catalog {
    customer_id: Uuid,
    customer: CustomerSummary,
    bakery_supplier: Uuid,
    spice_supplier: Uuid,
    products: Vec<ProductRecord>,
}

impl Catalog {
    fn new() -> Self {
        let bakery_supplier = Uuid::new_v4();
        let spice_supplier = Uuid::new_v4();
        let product = |supplier_id: Uuid, name: &str, price: i64, stock: u32| ProductRecord {
            id: Uuid::new_v4(),
            supplier_id,
            name: name.to_string(),
            unit_price: Decimal::from(price),
            stock_quantity: stock,
        };

        Self {
            customer_id: Uuid::new_v4(),
            customer: CustomerSummary {
                customer_name: "Corner Deli".to_string(),
                phone: Some("555-0101".to_string()),
            },
            products: vec![
                product(bakery_supplier, "Flour", 10, 40),
                product(bakery_supplier, "Sugar", 5, 25),
                product(spice_supplier, "Yeast", 15, 12),
                product(spice_supplier, "Saffron", 25, 1),
            ],
            bakery_supplier,
            spice_supplier,
        }
    }

    fn product_id(&self, name: &str) -> anyhow::Result<Uuid> {
        self.products
            .iter()
            .find(|product| product.name == name)
            .map(|product| product.id)
            .ok_or_else(|| anyhow::anyhow!("product {name} missing from catalog"))
    }
}

async fn open_store(config: &AppConfig, catalog: &Catalog) -> anyhow::Result<Arc<dyn OrderStore>> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.ensure_schema().await?;
            store.upsert_customer(catalog.customer_id, &catalog.customer).await?;
            for product in &catalog.products {
                store.upsert_product(product).await?;
            }
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            let store = InMemoryStore::new();
            store
                .insert_customer(catalog.customer_id, catalog.customer.clone())
                .await;
            for product in &catalog.products {
                store.insert_product(product.clone()).await;
            }
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize structured logging with environment-based filtering
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new("info,order_fulfillment=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order fulfillment demo");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    if config.metrics_enabled {
        // actix-web gets its own system on a dedicated thread
        let metrics_registry = Arc::new(metrics.registry().clone());
        let port = config.metrics_port;
        std::thread::spawn(move || {
            let result = actix_web::rt::System::new()
                .block_on(metrics::start_metrics_server(metrics_registry, port));
            if let Err(e) = result {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 2. Open the record store ===
    let catalog = Catalog::new();
    let store = open_store(&config, &catalog).await?;
    let service = Arc::new(OrderingService::new(store, config.checkout_timeout(), metrics.clone()));

    let flour = catalog.product_id("Flour")?;
    let sugar = catalog.product_id("Sugar")?;
    let yeast = catalog.product_id("Yeast")?;
    let saffron = catalog.product_id("Saffron")?;

    // === 3. Fill a cart and check out ===
    tracing::info!("🛒 Building a cart spanning two suppliers");
    let mut session = service.open_session(catalog.customer_id);
    service.add_to_cart(&mut session, flour, 2).await?;
    service.add_to_cart(&mut session, sugar, 4).await?;
    service.add_to_cart(&mut session, yeast, 1).await?;
    tracing::info!(lines = session.cart.line_count(), total = %session.cart.total(), "Cart ready");

    let order = service.checkout(&mut session).await?;
    tracing::info!(order_id = %order.id, total = %order.total_amount, "✅ Checkout complete");

    // === 4. Supplier views (idempotent read, safe to retry) ===
    let mut bakery_views = retry_on_transient(RetryConfig::interactive(), |_attempt| {
        service.list_supplier_orders(catalog.bakery_supplier, None)
    })
    .await
    .into_result()?;

    for view in &bakery_views {
        tracing::info!(
            order_id = %view.order_id,
            status = view.status.label(),
            lines = view.items.len(),
            subtotal = %view.supplier_subtotal,
            "Bakery supplier sees order"
        );
    }

    let spice_views = service.list_supplier_orders(catalog.spice_supplier, Some("yeast")).await?;
    tracing::info!(views = spice_views.len(), "Spice supplier search for 'yeast'");

    // === 5. Status lifecycle ===
    service
        .set_order_status_optimistic(order.id, OrderStatus::Confirmed, &mut bakery_views)
        .await?;
    service.set_order_status(order.id, OrderStatus::Shipped).await?;

    match service.set_order_status(order.id, OrderStatus::Cancelled).await {
        Err(OrderError::InvalidTransition { from, to }) => {
            tracing::info!(from = %from, to = %to, "Rejected illegal transition as expected");
        }
        other => tracing::warn!(?other, "Unexpected result for an illegal transition"),
    }

    // === 6. Race for the last unit of saffron ===
    tracing::info!("🏁 Five customers race for one unit of saffron");
    let racers = (0..5).map(|_| {
        let service = service.clone();
        let customer_id = catalog.customer_id;
        async move {
            let mut session = service.open_session(customer_id);
            service.add_to_cart(&mut session, saffron, 1).await?;
            service.checkout(&mut session).await
        }
    });
    let results = join_all(racers).await;
    let winners = results.iter().filter(|result| result.is_ok()).count();
    tracing::info!(winners, losers = results.len() - winners, "Race finished");

    let level = service.restock(catalog.spice_supplier, saffron, 3).await?;
    tracing::info!(stock = level, "Saffron back in stock");

    // === 7. Customer history ===
    let history = service.list_customer_orders(catalog.customer_id).await?;
    for view in &history {
        tracing::info!(
            order_id = %view.order_id,
            status = view.status.label(),
            total = %view.total_amount,
            "Customer order"
        );
    }

    if config.metrics_enabled {
        tracing::info!("⏳ Serving metrics on port {}; press Ctrl+C to exit", config.metrics_port);
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
