#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InventoryError {
    #[error("Product with ID {0} not found")]
    NotFound(i64),

    #[error("Product '{name}' is out of stock")]
    OutOfStock { product_id: i64, name: String },

    #[error("Insufficient stock for product '{name}'. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        available: i32,
        requested: i32,
    },
}
