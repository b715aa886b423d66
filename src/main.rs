use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storefront_orders::config::AppConfig;
use storefront_orders::domain::customer::CustomerCommandHandler;
use storefront_orders::domain::order::{
    CreateOrder, OrderCommandHandler, OrderItem, OrderStatus, UpdateOrderStatus,
};
use storefront_orders::domain::product::ProductCommandHandler;
use storefront_orders::metrics::{self, Metrics};
use storefront_orders::persistence::{seed_demo_data, InMemoryStore, PgStore, Store};
use storefront_orders::utils::RetryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_orders=debug")),
        )
        .init();

    tracing::info!("🚀 Starting storefront order service");

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // Metrics server runs on its own actix system thread
    let registry = metrics.registry().clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(registry, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. Open the store ===
    match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let retry = RetryConfig {
                initial_delay: Duration::from_millis(500),
                ..RetryConfig::default()
            }
            .with_max_attempts(config.db_connect_max_attempts);

            let store =
                PgStore::connect(url, config.database_max_connections, retry, &metrics).await?;
            store.ensure_schema().await?;
            run(Arc::new(store), metrics, &config).await
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            run(Arc::new(InMemoryStore::new()), metrics, &config).await
        }
    }
}

async fn run<S: Store>(store: Arc<S>, metrics: Arc<Metrics>, config: &AppConfig) -> anyhow::Result<()> {
    if config.seed_demo_data && seed_demo_data(store.as_ref()).await? {
        tracing::info!("🌱 Demo data loaded");
    }

    let customers = CustomerCommandHandler::new(store.clone());
    let products = ProductCommandHandler::new(store.clone());
    let orders = OrderCommandHandler::new(store, metrics);

    // === 3. Demonstrate the order workflow ===
    tracing::info!("📝 Demonstrating order placement with stock reservation");

    let catalog = products.list().await?;
    let Some(customer) = customers.list().await?.into_iter().next() else {
        tracing::warn!("No customers in store, nothing to demonstrate");
        return Ok(());
    };
    if catalog.len() < 2 {
        tracing::warn!("Catalog has fewer than two products, nothing to demonstrate");
        return Ok(());
    }

    let order = orders
        .create_order(CreateOrder {
            customer_id: customer.id,
            items: vec![
                OrderItem::new(catalog[0].id, 2),
                OrderItem::new(catalog[1].id, 1),
            ],
        })
        .await?;
    tracing::info!("✅ Order placed:\n{}", serde_json::to_string_pretty(&order)?);

    // A request beyond available stock is rejected without side effects
    let greedy = catalog[0].stock.saturating_add(1);
    if let Err(e) = orders
        .create_order(CreateOrder {
            customer_id: customer.id,
            items: vec![OrderItem::new(catalog[1].id, 1), OrderItem::new(catalog[0].id, greedy)],
        })
        .await
    {
        tracing::info!(client_error = e.is_client_error(), "Rejected as expected: {}", e);
    }

    for status in [OrderStatus::Processing, OrderStatus::Shipped] {
        orders
            .update_status(UpdateOrderStatus { order_id: order.id, status })
            .await?;
    }

    if let Some(current) = orders.get_order(order.id).await? {
        tracing::info!(order_id = current.id, status = %current.status, "✅ Order advanced");
    }

    for product in products.list().await? {
        tracing::info!(product_id = product.id, name = %product.name, stock = product.stock, "Stock level");
    }

    tracing::info!("🎉 Demo complete! Metrics at :{}/metrics, Ctrl+C to exit", config.metrics_port);
    tokio::signal::ctrl_c().await?;

    Ok(())
}
