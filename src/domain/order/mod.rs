// ============================================================================
// Order Domain - Order Workflow Engine
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus)
// - Commands (CreateOrder, UpdateOrderStatus)
// - Errors (OrderError enum)
// - Aggregate (Order, OrderLineItem, NewOrder)
// - DTOs (OrderDto projection returned to callers)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod dtos;
pub mod command_handler;

// Re-export commonly used types
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use dtos::*;
pub use command_handler::*;
