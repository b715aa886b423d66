use serde::{Deserialize, Serialize};

use super::value_objects::{OrderItem, OrderStatus};

// ============================================================================
// Order Commands - Already shape-validated payloads from the API layer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub customer_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub order_id: i64,
    pub status: OrderStatus,
}
