use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};

use crate::domain::customer::{Customer, CustomerDetails, Email, PhoneNumber};
use crate::domain::order::{NewOrder, Order, OrderLineItem, OrderStatus};
use crate::domain::product::{Product, ProductDetails};
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};
use super::schema::SCHEMA;
use super::unit_of_work::{
    CustomerRepository, OrderRepository, PersistenceError, PersistenceResult, ProductRepository,
    Store, UnitOfWork,
};

// ============================================================================
// Postgres Store
// ============================================================================
//
// One sqlx transaction per session. `get_for_update` issues
// `SELECT ... FOR UPDATE`, so a second workflow reserving the same product
// blocks until the first commits or rolls back and then reads the committed
// stock. Constraint, serialization and deadlock failures surface as
// `PersistenceError::Conflict`; the transaction is rolled back when the
// session is dropped.
//
// ============================================================================

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

pub(crate) fn map_db_error(err: sqlx::Error) -> PersistenceError {
    if let sqlx::Error::Database(db) = &err {
        let retryable_conflict = matches!(
            db.code().as_deref(),
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
        );
        if db.is_unique_violation()
            || db.is_foreign_key_violation()
            || db.is_check_violation()
            || retryable_conflict
        {
            return PersistenceError::Conflict(db.message().to_string());
        }
    }
    PersistenceError::Database(err)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with exponential backoff on transient failures.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        retry: RetryConfig,
        metrics: &Metrics,
    ) -> PersistenceResult<Self> {
        let outcome = retry_on_transient(retry, |attempt| {
            metrics.record_retry_attempt("db_connect", attempt);
            let url = url.to_string();
            async move {
                PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(&url)
                    .await
                    .map_err(map_db_error)
            }
        })
        .await;

        match outcome {
            RetryResult::Success(pool) => {
                metrics.record_retry_outcome("db_connect", true);
                tracing::info!(max_connections, "Connected to Postgres");
                Ok(Self::new(pool))
            }
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => {
                metrics.record_retry_outcome("db_connect", false);
                Err(e)
            }
        }
    }

    /// Create tables, constraints and indexes if they are missing.
    pub async fn ensure_schema(&self) -> PersistenceResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        }
        tracing::info!(statements = SCHEMA.len(), "Schema ensured");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Session = PgUnitOfWork;

    async fn begin(&self) -> PersistenceResult<PgUnitOfWork> {
        let tx = self.pool.begin().await.map_err(map_db_error)?;
        Ok(PgUnitOfWork { tx })
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            email: Email(row.email),
            phone: PhoneNumber(row.phone),
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price: f64,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    order_date: DateTime<Utc>,
    status: i32,
    total_price: f64,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct LineItemRow {
    order_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: f64,
}

fn assemble(row: OrderRow, lines: Vec<OrderLineItem>) -> PersistenceResult<Order> {
    let status = OrderStatus::try_from(row.status).map_err(|e| {
        PersistenceError::InvalidRow(format!("order {}: {}", row.id, e))
    })?;

    Ok(Order {
        id: row.id,
        customer_id: row.customer_id,
        order_date: row.order_date,
        status,
        total_price: row.total_price,
        updated_at: row.updated_at,
        line_items: lines,
    })
}

/// `line_no` column value for the line at `index`.
fn line_number(index: usize) -> PersistenceResult<i32> {
    i32::try_from(index).map_err(|_| {
        PersistenceError::InvalidRow(format!("line index {} exceeds the line_no column", index))
    })
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, customer_id, order_date, status, total_price, updated_at";

impl PgUnitOfWork {
    async fn load_orders(&mut self, rows: Vec<OrderRow>) -> PersistenceResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let line_rows: Vec<LineItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, quantity, unit_price
             FROM order_line_items
             WHERE order_id = ANY($1)
             ORDER BY order_id, line_no",
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        let mut lines: HashMap<i64, Vec<OrderLineItem>> = HashMap::new();
        for line in line_rows {
            lines.entry(line.order_id).or_default().push(OrderLineItem {
                order_id: line.order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        rows.into_iter()
            .map(|row| {
                let items = lines.remove(&row.id).unwrap_or_default();
                assemble(row, items)
            })
            .collect()
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn customers(&mut self) -> &mut dyn CustomerRepository {
        self
    }

    fn products(&mut self) -> &mut dyn ProductRepository {
        self
    }

    fn orders(&mut self) -> &mut dyn OrderRepository {
        self
    }

    async fn commit(self) -> PersistenceResult<()> {
        self.tx.commit().await.map_err(map_db_error)
    }

    async fn rollback(self) -> PersistenceResult<()> {
        self.tx.rollback().await.map_err(map_db_error)
    }
}

#[async_trait]
impl CustomerRepository for PgUnitOfWork {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> =
            sqlx::query_as("SELECT id, name, email, phone FROM customers ORDER BY id")
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Customer::from).collect())
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Customer>> {
        let row: Option<CustomerRow> =
            sqlx::query_as("SELECT id, name, email, phone FROM customers WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_db_error)?;
        Ok(row.map(Customer::from))
    }

    async fn add(&mut self, details: CustomerDetails) -> PersistenceResult<Customer> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO customers (name, email, phone) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&details.name)
        .bind(details.email.as_str())
        .bind(details.phone.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(Customer::from_details(id, details))
    }

    async fn update(&mut self, customer: &Customer) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE customers SET name = $1, email = $2, phone = $3 WHERE id = $4")
            .bind(&customer.name)
            .bind(customer.email.as_str())
            .bind(customer.phone.as_str())
            .bind(customer.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::MissingRow { entity: "Customer", id: customer.id });
        }
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }

    async fn is_email_unique(
        &mut self,
        email: &Email,
        excluding: Option<i64>,
    ) -> PersistenceResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM customers
                WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2)
            )",
        )
        .bind(email.as_str())
        .bind(excluding)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(!taken)
    }
}

#[async_trait]
impl ProductRepository for PgUnitOfWork {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS))
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_db_error)?;
        Ok(row.map(Product::from))
    }

    async fn get_for_update(&mut self, id: i64) -> PersistenceResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Product::from))
    }

    async fn add(
        &mut self,
        details: ProductDetails,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<Product> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (name, description, price, stock, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(&details.name)
        .bind(&details.description)
        .bind(details.price)
        .bind(details.stock)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(Product::from_details(id, details, created_at))
    }

    async fn update(&mut self, product: &Product) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE products
             SET name = $1, description = $2, price = $3, stock = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::MissingRow { entity: "Product", id: product.id });
        }
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }

    async fn is_referenced(&mut self, id: i64) -> PersistenceResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_line_items WHERE product_id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }
}

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Order>> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders ORDER BY id", ORDER_COLUMNS))
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_db_error)?;
        self.load_orders(rows).await
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_db_error)?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_by_customer(&mut self, customer_id: i64) -> PersistenceResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE customer_id = $1 ORDER BY id",
            ORDER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_error)?;
        self.load_orders(rows).await
    }

    async fn add(&mut self, order: NewOrder) -> PersistenceResult<Order> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (customer_id, order_date, status, total_price)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(order.customer_id)
        .bind(order.order_date)
        .bind(order.status.code())
        .bind(order.total_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        for (line_no, line) in order.line_items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_line_items (order_id, product_id, line_no, quantity, unit_price)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(line.product_id)
            .bind(line_number(line_no)?)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        }

        Ok(Order::from_new(id, order))
    }

    async fn update(&mut self, order: &Order) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(order.status.code())
            .bind(order.updated_at)
            .bind(order.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::MissingRow { entity: "Order", id: order.id });
        }
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_db_error)
    }
}

// Database operations need a live Postgres server; these tests cover the
// mapping logic only.
#[cfg(test)]
mod tests {
    use super::*;

    fn order_row(status: i32) -> OrderRow {
        OrderRow {
            id: 5,
            customer_id: 1,
            order_date: Utc::now(),
            status,
            total_price: 90.0,
            updated_at: None,
        }
    }

    #[test]
    fn test_assemble_decodes_status_code() {
        let order = assemble(order_row(2), vec![]).unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.total_price, 90.0);
    }

    #[test]
    fn test_assemble_rejects_unknown_status() {
        let err = assemble(order_row(9), vec![]).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidRow(_)));
    }

    #[test]
    fn test_line_number_is_range_checked() {
        assert_eq!(line_number(0).unwrap(), 0);
        assert_eq!(line_number(41).unwrap(), 41);
        assert!(matches!(
            line_number(i32::MAX as usize + 1),
            Err(PersistenceError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(matches!(
            map_db_error(sqlx::Error::RowNotFound),
            PersistenceError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[test]
    fn test_rows_map_to_domain_types() {
        let customer: Customer = CustomerRow {
            id: 1,
            name: "Jane Smith".into(),
            email: "jane.smith@example.com".into(),
            phone: "987-654-3210".into(),
        }
        .into();
        assert_eq!(customer.email.as_str(), "jane.smith@example.com");

        let product: Product = ProductRow {
            id: 2,
            name: "Smartphone".into(),
            description: "Latest model smartphone".into(),
            price: 800.0,
            stock: 100,
            created_at: Utc::now(),
            updated_at: None,
        }
        .into();
        assert_eq!(product.stock, 100);
    }
}
