use crate::domain::inventory::InventoryError;
use crate::persistence::PersistenceError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Customer with ID {0} not found")]
    CustomerNotFound(i64),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Quantity must be greater than zero (product {product_id}, quantity {quantity})")]
    InvalidQuantity { product_id: i64, quantity: i32 },

    #[error("Product with ID {0} not found")]
    ProductNotFound(i64),

    #[error("Product '{name}' is out of stock")]
    OutOfStock { product_id: i64, name: String },

    #[error("Insufficient stock for product '{name}'. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        available: i32,
        requested: i32,
    },

    #[error("Order with ID {0} not found")]
    OrderNotFound(i64),

    #[error("Unknown order status code: {0}")]
    UnknownStatus(i32),

    #[error("Commit rejected by storage: {0}")]
    CommitConflict(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] PersistenceError),
}

impl OrderError {
    /// Business-rule failures map to client errors; storage failures do not.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, OrderError::CommitConflict(_) | OrderError::Storage(_))
    }

    /// Label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::CustomerNotFound(_) => "customer_not_found",
            OrderError::EmptyOrder => "empty_order",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::OutOfStock { .. } => "out_of_stock",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::UnknownStatus(_) => "unknown_status",
            OrderError::CommitConflict(_) => "commit_conflict",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl From<PersistenceError> for OrderError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict(msg) => OrderError::CommitConflict(msg),
            other => OrderError::Storage(other),
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(id) => OrderError::ProductNotFound(id),
            InventoryError::OutOfStock { product_id, name } => {
                OrderError::OutOfStock { product_id, name }
            }
            InventoryError::InsufficientStock {
                product_id,
                name,
                available,
                requested,
            } => OrderError::InsufficientStock {
                product_id,
                name,
                available,
                requested,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_names_product() {
        let err = OrderError::InsufficientStock {
            product_id: 1,
            name: "Laptop".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product 'Laptop'. Available: 3, Requested: 5"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_storage_failures_are_server_errors() {
        let conflict: OrderError = PersistenceError::Conflict("fk".into()).into();
        assert!(matches!(conflict, OrderError::CommitConflict(_)));
        assert!(!conflict.is_client_error());

        let missing: OrderError = PersistenceError::MissingRow { entity: "Order", id: 1 }.into();
        assert!(matches!(missing, OrderError::Storage(_)));
        assert!(!missing.is_client_error());
    }

    #[test]
    fn test_inventory_errors_carry_over_verbatim() {
        let err: OrderError = InventoryError::InsufficientStock {
            product_id: 2,
            name: "Tablet".into(),
            available: 1,
            requested: 4,
        }
        .into();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { product_id: 2, available: 1, requested: 4, .. }
        ));

        let err: OrderError = InventoryError::NotFound(9).into();
        assert!(matches!(err, OrderError::ProductNotFound(9)));
    }
}
