use crate::persistence::PersistenceError;

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Product with ID {0} not found")]
    NotFound(i64),

    #[error("Name is required")]
    EmptyName,

    #[error("Price cannot be negative: {0}")]
    NegativePrice(f64),

    #[error("Stock cannot be negative: {0}")]
    NegativeStock(i32),

    #[error("Product with ID {0} is referenced by existing orders")]
    ReferencedByOrders(i64),

    #[error("Commit rejected by storage: {0}")]
    CommitConflict(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] PersistenceError),
}

impl ProductError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ProductError::CommitConflict(_) | ProductError::Storage(_))
    }
}

impl From<PersistenceError> for ProductError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict(msg) => ProductError::CommitConflict(msg),
            other => ProductError::Storage(other),
        }
    }
}
