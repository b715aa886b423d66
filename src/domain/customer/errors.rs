use crate::persistence::PersistenceError;

// ============================================================================
// Customer Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CustomerError {
    #[error("Customer with ID {0} not found")]
    NotFound(i64),

    #[error("Email is already in use: {0}")]
    DuplicateEmail(String),

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Email cannot be empty")]
    EmptyEmail,

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Commit rejected by storage: {0}")]
    CommitConflict(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] PersistenceError),
}

impl CustomerError {
    /// Business-rule failures are the caller's fault; the rest are ours.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CustomerError::CommitConflict(_) | CustomerError::Storage(_))
    }
}

impl From<PersistenceError> for CustomerError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict(msg) => CustomerError::CommitConflict(msg),
            other => CustomerError::Storage(other),
        }
    }
}
