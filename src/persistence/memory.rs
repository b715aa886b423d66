use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::customer::{Customer, CustomerDetails, Email};
use crate::domain::order::{NewOrder, Order};
use crate::domain::product::{Product, ProductDetails};
use super::unit_of_work::{
    CustomerRepository, OrderRepository, PersistenceError, PersistenceResult, ProductRepository,
    Store, UnitOfWork,
};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Committed rows live behind one RwLock. A session keeps its writes in a
// private overlay (`None` marks a deletion) and only its own reads see them.
// Product row locks are per-id async mutexes; a session keeps the owned
// guards until it commits or is dropped, which serializes reservations on the
// same product across sessions.
//
// Commit builds the next table state, checks every constraint on it, and
// swaps it in only if all of them hold.
//
// ============================================================================

#[derive(Debug, Default, Clone)]
struct Tables {
    customers: BTreeMap<i64, Customer>,
    products: BTreeMap<i64, Product>,
    orders: BTreeMap<i64, Order>,
}

impl Tables {
    fn check_constraints(&self) -> PersistenceResult<()> {
        let mut emails = HashSet::new();
        for customer in self.customers.values() {
            if !emails.insert(customer.email.as_str()) {
                return Err(PersistenceError::Conflict(format!(
                    "duplicate customer email '{}'",
                    customer.email.as_str()
                )));
            }
        }

        for product in self.products.values() {
            if product.stock < 0 {
                return Err(PersistenceError::Conflict(format!(
                    "product {} stock would become {}",
                    product.id, product.stock
                )));
            }
            if !(product.price >= 0.0) {
                return Err(PersistenceError::Conflict(format!(
                    "product {} price {} is negative",
                    product.id, product.price
                )));
            }
        }

        for order in self.orders.values() {
            if !self.customers.contains_key(&order.customer_id) {
                return Err(PersistenceError::Conflict(format!(
                    "order {} references missing customer {}",
                    order.id, order.customer_id
                )));
            }

            let mut seen = HashSet::new();
            for line in &order.line_items {
                if line.quantity <= 0 {
                    return Err(PersistenceError::Conflict(format!(
                        "order {} line for product {} has quantity {}",
                        order.id, line.product_id, line.quantity
                    )));
                }
                if !seen.insert(line.product_id) {
                    return Err(PersistenceError::Conflict(format!(
                        "order {} lists product {} twice",
                        order.id, line.product_id
                    )));
                }
                if !self.products.contains_key(&line.product_id) {
                    return Err(PersistenceError::Conflict(format!(
                        "order {} references missing product {}",
                        order.id, line.product_id
                    )));
                }
            }
        }

        Ok(())
    }
}

struct Shared {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    next_customer_id: AtomicI64,
    next_product_id: AtomicI64,
    next_order_id: AtomicI64,
}

/// Process-local store with the same transactional guarantees as the
/// Postgres backend. Cloning shares the underlying tables.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                next_customer_id: AtomicI64::new(1),
                next_product_id: AtomicI64::new(1),
                next_order_id: AtomicI64::new(1),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> PersistenceResult<InMemorySession> {
        Ok(InMemorySession {
            shared: self.shared.clone(),
            customers: BTreeMap::new(),
            products: BTreeMap::new(),
            orders: BTreeMap::new(),
            row_guards: HashMap::new(),
        })
    }
}

pub struct InMemorySession {
    shared: Arc<Shared>,
    customers: BTreeMap<i64, Option<Customer>>,
    products: BTreeMap<i64, Option<Product>>,
    orders: BTreeMap<i64, Option<Order>>,
    row_guards: HashMap<i64, OwnedMutexGuard<()>>,
}

fn read_row<T: Clone>(
    staged: &BTreeMap<i64, Option<T>>,
    committed: &BTreeMap<i64, T>,
    id: i64,
) -> Option<T> {
    match staged.get(&id) {
        Some(row) => row.clone(),
        None => committed.get(&id).cloned(),
    }
}

fn read_all<T: Clone>(staged: &BTreeMap<i64, Option<T>>, committed: &BTreeMap<i64, T>) -> Vec<T> {
    let mut rows = committed.clone();
    apply(&mut rows, staged.clone());
    rows.into_values().collect()
}

fn apply<T>(rows: &mut BTreeMap<i64, T>, staged: BTreeMap<i64, Option<T>>) {
    for (id, row) in staged {
        match row {
            Some(row) => {
                rows.insert(id, row);
            }
            None => {
                rows.remove(&id);
            }
        }
    }
}

impl InMemorySession {
    async fn customer(&self, id: i64) -> Option<Customer> {
        let tables = self.shared.tables.read().await;
        read_row(&self.customers, &tables.customers, id)
    }

    async fn product(&self, id: i64) -> Option<Product> {
        let tables = self.shared.tables.read().await;
        read_row(&self.products, &tables.products, id)
    }

    async fn order(&self, id: i64) -> Option<Order> {
        let tables = self.shared.tables.read().await;
        read_row(&self.orders, &tables.orders, id)
    }

    async fn all_orders(&self) -> Vec<Order> {
        let tables = self.shared.tables.read().await;
        read_all(&self.orders, &tables.orders)
    }

    async fn lock_row(&mut self, id: i64) {
        if self.row_guards.contains_key(&id) {
            return;
        }

        let lock = {
            let mut locks = self.shared.row_locks.lock().await;
            locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };

        let guard = lock.lock_owned().await;
        self.row_guards.insert(id, guard);
    }
}

#[async_trait]
impl UnitOfWork for InMemorySession {
    fn customers(&mut self) -> &mut dyn CustomerRepository {
        self
    }

    fn products(&mut self) -> &mut dyn ProductRepository {
        self
    }

    fn orders(&mut self) -> &mut dyn OrderRepository {
        self
    }

    async fn commit(mut self) -> PersistenceResult<()> {
        let mut tables = self.shared.tables.write().await;

        let mut next = tables.clone();
        apply(&mut next.customers, std::mem::take(&mut self.customers));
        apply(&mut next.products, std::mem::take(&mut self.products));
        apply(&mut next.orders, std::mem::take(&mut self.orders));

        next.check_constraints()?;
        *tables = next;

        // Row guards are released when `self` drops, after the swap.
        Ok(())
    }

    async fn rollback(self) -> PersistenceResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for InMemorySession {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Customer>> {
        let tables = self.shared.tables.read().await;
        Ok(read_all(&self.customers, &tables.customers))
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Customer>> {
        Ok(self.customer(id).await)
    }

    async fn add(&mut self, details: CustomerDetails) -> PersistenceResult<Customer> {
        let id = self.shared.next_customer_id.fetch_add(1, Ordering::SeqCst);
        let customer = Customer::from_details(id, details);
        self.customers.insert(id, Some(customer.clone()));
        Ok(customer)
    }

    async fn update(&mut self, customer: &Customer) -> PersistenceResult<()> {
        if self.customer(customer.id).await.is_none() {
            return Err(PersistenceError::MissingRow { entity: "Customer", id: customer.id });
        }
        self.customers.insert(customer.id, Some(customer.clone()));
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        // Orders go with their customer.
        for order in self.all_orders().await {
            if order.customer_id == id {
                self.orders.insert(order.id, None);
            }
        }
        self.customers.insert(id, None);
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        Ok(self.customer(id).await.is_some())
    }

    async fn is_email_unique(
        &mut self,
        email: &Email,
        excluding: Option<i64>,
    ) -> PersistenceResult<bool> {
        let tables = self.shared.tables.read().await;
        let taken = read_all(&self.customers, &tables.customers)
            .iter()
            .any(|c| &c.email == email && Some(c.id) != excluding);
        Ok(!taken)
    }
}

#[async_trait]
impl ProductRepository for InMemorySession {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Product>> {
        let tables = self.shared.tables.read().await;
        Ok(read_all(&self.products, &tables.products))
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Product>> {
        Ok(self.product(id).await)
    }

    async fn get_for_update(&mut self, id: i64) -> PersistenceResult<Option<Product>> {
        self.lock_row(id).await;
        Ok(self.product(id).await)
    }

    async fn add(
        &mut self,
        details: ProductDetails,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<Product> {
        let id = self.shared.next_product_id.fetch_add(1, Ordering::SeqCst);
        let product = Product::from_details(id, details, created_at);
        self.products.insert(id, Some(product.clone()));
        Ok(product)
    }

    async fn update(&mut self, product: &Product) -> PersistenceResult<()> {
        if self.product(product.id).await.is_none() {
            return Err(PersistenceError::MissingRow { entity: "Product", id: product.id });
        }
        self.products.insert(product.id, Some(product.clone()));
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        if ProductRepository::is_referenced(self, id).await? {
            return Err(PersistenceError::Conflict(format!(
                "product {} is referenced by order line items",
                id
            )));
        }
        self.products.insert(id, None);
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        Ok(self.product(id).await.is_some())
    }

    async fn is_referenced(&mut self, id: i64) -> PersistenceResult<bool> {
        Ok(self
            .all_orders()
            .await
            .iter()
            .any(|o| o.line_items.iter().any(|line| line.product_id == id)))
    }
}

#[async_trait]
impl OrderRepository for InMemorySession {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Order>> {
        Ok(self.all_orders().await)
    }

    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Order>> {
        Ok(self.order(id).await)
    }

    async fn get_by_customer(&mut self, customer_id: i64) -> PersistenceResult<Vec<Order>> {
        Ok(self
            .all_orders()
            .await
            .into_iter()
            .filter(|o| o.customer_id == customer_id)
            .collect())
    }

    async fn add(&mut self, order: NewOrder) -> PersistenceResult<Order> {
        let id = self.shared.next_order_id.fetch_add(1, Ordering::SeqCst);
        let order = Order::from_new(id, order);
        self.orders.insert(id, Some(order.clone()));
        Ok(order)
    }

    async fn update(&mut self, order: &Order) -> PersistenceResult<()> {
        let mut stored = self
            .order(order.id)
            .await
            .ok_or(PersistenceError::MissingRow { entity: "Order", id: order.id })?;

        stored.status = order.status;
        stored.updated_at = order.updated_at;
        self.orders.insert(order.id, Some(stored));
        Ok(())
    }

    async fn delete(&mut self, id: i64) -> PersistenceResult<()> {
        self.orders.insert(id, None);
        Ok(())
    }

    async fn exists(&mut self, id: i64) -> PersistenceResult<bool> {
        Ok(self.order(id).await.is_some())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
