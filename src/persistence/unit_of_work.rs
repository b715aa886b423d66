use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::customer::{Customer, CustomerDetails, Email};
use crate::domain::order::{NewOrder, Order};
use crate::domain::product::{Product, ProductDetails};
use crate::utils::IsTransient;

// ============================================================================
// Persistence Gateway - Unit of Work contracts
// ============================================================================
//
// A `Store` hands out one `UnitOfWork` per workflow invocation. Everything
// staged through the session's repositories becomes durable on `commit` or is
// discarded on `rollback` / drop. Reads see committed state plus the session's
// own staged writes, never another session's staged writes.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A uniqueness, foreign-key or check constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("{entity} with ID {id} does not exist")]
    MissingRow { entity: &'static str, id: i64 },

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IsTransient for PersistenceError {
    fn is_transient(&self) -> bool {
        match self {
            PersistenceError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            PersistenceError::Conflict(_)
            | PersistenceError::MissingRow { .. }
            | PersistenceError::InvalidRow(_) => false,
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Opens sessions against durable storage.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Session: UnitOfWork;

    async fn begin(&self) -> PersistenceResult<Self::Session>;
}

/// One transactional session. Repositories are bound to it for its lifetime.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    fn customers(&mut self) -> &mut dyn CustomerRepository;
    fn products(&mut self) -> &mut dyn ProductRepository;
    fn orders(&mut self) -> &mut dyn OrderRepository;

    /// Apply every staged change atomically.
    async fn commit(self) -> PersistenceResult<()>;

    /// Discard every staged change and release held locks.
    async fn rollback(self) -> PersistenceResult<()>;
}

#[async_trait]
pub trait CustomerRepository: Send {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Customer>>;
    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Customer>>;
    async fn add(&mut self, details: CustomerDetails) -> PersistenceResult<Customer>;
    async fn update(&mut self, customer: &Customer) -> PersistenceResult<()>;
    async fn delete(&mut self, id: i64) -> PersistenceResult<()>;
    async fn exists(&mut self, id: i64) -> PersistenceResult<bool>;

    /// True when no customer other than `excluding` uses this exact email.
    async fn is_email_unique(
        &mut self,
        email: &Email,
        excluding: Option<i64>,
    ) -> PersistenceResult<bool>;
}

#[async_trait]
pub trait ProductRepository: Send {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Product>>;
    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Product>>;

    /// Read a product and hold its row lock until the session ends.
    async fn get_for_update(&mut self, id: i64) -> PersistenceResult<Option<Product>>;

    async fn add(
        &mut self,
        details: ProductDetails,
        created_at: DateTime<Utc>,
    ) -> PersistenceResult<Product>;
    async fn update(&mut self, product: &Product) -> PersistenceResult<()>;
    async fn delete(&mut self, id: i64) -> PersistenceResult<()>;
    async fn exists(&mut self, id: i64) -> PersistenceResult<bool>;

    /// True when any order line item points at this product.
    async fn is_referenced(&mut self, id: i64) -> PersistenceResult<bool>;
}

#[async_trait]
pub trait OrderRepository: Send {
    async fn get_all(&mut self) -> PersistenceResult<Vec<Order>>;
    async fn get_by_id(&mut self, id: i64) -> PersistenceResult<Option<Order>>;
    async fn get_by_customer(&mut self, customer_id: i64) -> PersistenceResult<Vec<Order>>;
    async fn add(&mut self, order: NewOrder) -> PersistenceResult<Order>;

    /// Persist status and `updated_at`; line items are immutable.
    async fn update(&mut self, order: &Order) -> PersistenceResult<()>;
    async fn delete(&mut self, id: i64) -> PersistenceResult<()>;
    async fn exists(&mut self, id: i64) -> PersistenceResult<bool>;
}
