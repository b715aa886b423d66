use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::customer::Customer;
use crate::domain::inventory::InventoryLedger;
use crate::domain::product::Product;
use crate::metrics::Metrics;
use crate::persistence::{PersistenceError, Store, UnitOfWork};

use super::aggregate::{NewOrder, Order};
use super::commands::{CreateOrder, UpdateOrderStatus};
use super::dtos::OrderDto;
use super::errors::OrderError;
use super::value_objects::OrderItem;

// ============================================================================
// Order Command Handler - Order Workflow Engine
// ============================================================================
//
// Orchestrates: Command → Session → Inventory Ledger → Order → Commit
//
// Each invocation owns exactly one session. Every early return drops the
// session uncommitted, so a failure at any step leaves stock and orders
// exactly as they were before the call.
//
// ============================================================================

pub struct OrderCommandHandler<S: Store> {
    store: Arc<S>,
    metrics: Arc<Metrics>,
}

impl<S: Store> OrderCommandHandler<S> {
    pub fn new(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Place an order, reserving stock for every item or for none of them.
    pub async fn create_order(&self, command: CreateOrder) -> Result<OrderDto, OrderError> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "create_order",
            %correlation_id,
            customer_id = command.customer_id,
            item_count = command.items.len()
        );

        async {
            let started = Instant::now();
            let result = self.place_order(command).await;
            let elapsed = started.elapsed().as_secs_f64();

            match &result {
                Ok(order) => {
                    let units: i64 = order.products.iter().map(|p| i64::from(p.quantity)).sum();
                    self.metrics.record_order_created(units.unsigned_abs(), elapsed);
                    tracing::info!(
                        order_id = order.id,
                        total_price = order.total_price,
                        products = order.product_count,
                        "✅ Order created"
                    );
                }
                Err(e) => {
                    log_failure(e);
                    self.metrics.record_order_failure("create_order", e.reason(), elapsed);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn place_order(&self, command: CreateOrder) -> Result<OrderDto, OrderError> {
        // Rejected before any session is opened.
        if command.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut uow = self.store.begin().await?;

        let customer = uow
            .customers()
            .get_by_id(command.customer_id)
            .await?
            .ok_or(OrderError::CustomerNotFound(command.customer_id))?;

        validate_quantities(&command.items)?;

        let mut ledger =
            InventoryLedger::lock(uow.products(), command.items.iter().map(|i| i.product_id))
                .await?;

        let now = Utc::now();
        let mut order = NewOrder::pending(customer.id, now);

        for item in &command.items {
            let unit_price = ledger.try_reserve(item.product_id, item.quantity, now)?;
            order.add_line(item.product_id, item.quantity, unit_price);
        }

        ledger.stage(uow.products()).await?;
        let order = uow.orders().add(order).await?;
        uow.commit().await?;

        Ok(OrderDto::project(&order, &customer, &ledger.into_catalog()))
    }

    /// Set a new status on an existing order.
    ///
    /// Returns `Ok(false)` without writing anything when the order does not
    /// exist. Any status may follow any other.
    pub async fn update_status(&self, command: UpdateOrderStatus) -> Result<bool, OrderError> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "update_order_status",
            %correlation_id,
            order_id = command.order_id,
            status = %command.status
        );

        async {
            let started = Instant::now();
            let result = self.apply_status(command).await;
            let elapsed = started.elapsed().as_secs_f64();

            match &result {
                Ok(true) => {
                    self.metrics.record_status_update(command.status.as_str(), elapsed);
                    tracing::info!("Order status updated");
                }
                Ok(false) => {
                    let missing = OrderError::OrderNotFound(command.order_id);
                    tracing::warn!("{}", missing);
                    self.metrics.record_order_failure("update_status", missing.reason(), elapsed);
                }
                Err(e) => {
                    log_failure(e);
                    self.metrics.record_order_failure("update_status", e.reason(), elapsed);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn apply_status(&self, command: UpdateOrderStatus) -> Result<bool, OrderError> {
        let mut uow = self.store.begin().await?;

        let Some(mut order) = uow.orders().get_by_id(command.order_id).await? else {
            uow.rollback().await?;
            return Ok(false);
        };

        let previous = order.status;
        order.set_status(command.status, Utc::now());
        uow.orders().update(&order).await?;
        uow.commit().await?;

        tracing::debug!(from = %previous, to = %order.status, "Status transition committed");
        Ok(true)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_order(&self, order_id: i64) -> Result<Option<OrderDto>, OrderError> {
        let mut uow = self.store.begin().await?;
        let order = uow.orders().get_by_id(order_id).await?;

        let dto = match order {
            Some(order) => project_all(&mut uow, vec![order]).await?.pop(),
            None => None,
        };

        uow.rollback().await?;
        Ok(dto)
    }

    pub async fn list_orders(&self) -> Result<Vec<OrderDto>, OrderError> {
        let mut uow = self.store.begin().await?;
        let orders = uow.orders().get_all().await?;
        let dtos = project_all(&mut uow, orders).await?;
        uow.rollback().await?;
        Ok(dtos)
    }

    pub async fn orders_by_customer(&self, customer_id: i64) -> Result<Vec<OrderDto>, OrderError> {
        let mut uow = self.store.begin().await?;
        let orders = uow.orders().get_by_customer(customer_id).await?;
        let dtos = project_all(&mut uow, orders).await?;
        uow.rollback().await?;
        Ok(dtos)
    }
}

/// The first non-positive quantity, in submission order, is reported.
fn validate_quantities(items: &[OrderItem]) -> Result<(), OrderError> {
    if let Some(item) = items.iter().find(|item| item.quantity <= 0) {
        return Err(OrderError::InvalidQuantity {
            product_id: item.product_id,
            quantity: item.quantity,
        });
    }

    Ok(())
}

fn log_failure(err: &OrderError) {
    if err.is_client_error() {
        tracing::warn!(reason = err.reason(), "Order workflow rejected: {}", err);
    } else {
        tracing::error!(reason = err.reason(), error = ?err, "Order workflow failed");
    }
}

/// Resolve customer names and product display fields for a batch of orders.
async fn project_all<U: UnitOfWork>(
    uow: &mut U,
    orders: Vec<Order>,
) -> Result<Vec<OrderDto>, OrderError> {
    let mut customers: HashMap<i64, Customer> = HashMap::new();
    let mut catalog: HashMap<i64, Product> = HashMap::new();

    for order in &orders {
        if !customers.contains_key(&order.customer_id) {
            let customer = uow.customers().get_by_id(order.customer_id).await?.ok_or(
                PersistenceError::MissingRow {
                    entity: "Customer",
                    id: order.customer_id,
                },
            )?;
            customers.insert(customer.id, customer);
        }

        for line in &order.line_items {
            if catalog.contains_key(&line.product_id) {
                continue;
            }
            if let Some(product) = uow.products().get_by_id(line.product_id).await? {
                catalog.insert(product.id, product);
            }
        }
    }

    let mut dtos = Vec::with_capacity(orders.len());
    for order in &orders {
        if let Some(customer) = customers.get(&order.customer_id) {
            dtos.push(OrderDto::project(order, customer, &catalog));
        }
    }
    Ok(dtos)
}

// ============================================================================
// Unit Tests
// ============================================================================
