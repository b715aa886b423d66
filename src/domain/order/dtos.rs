use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::Customer;
use crate::domain::product::Product;
use super::aggregate::Order;
use super::value_objects::OrderStatus;

// ============================================================================
// Order projections returned to the API layer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderProductDto {
    pub product_id: i64,
    pub name: String,
    pub description: String,
    /// Unit price captured when the order was placed.
    pub price: f64,
    pub quantity: i32,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDto {
    pub id: i64,
    pub customer_id: i64,
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_price: f64,
    pub product_count: usize,
    pub products: Vec<OrderProductDto>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderDto {
    /// Project an order, resolving display fields from the customer and the
    /// catalog. Products missing from `catalog` keep empty display fields.
    pub fn project(order: &Order, customer: &Customer, catalog: &HashMap<i64, Product>) -> Self {
        let products = order
            .line_items
            .iter()
            .map(|line| {
                let (name, description) = catalog
                    .get(&line.product_id)
                    .map(|p| (p.name.clone(), p.description.clone()))
                    .unwrap_or_default();

                OrderProductDto {
                    product_id: line.product_id,
                    name,
                    description,
                    price: line.unit_price,
                    quantity: line.quantity,
                    subtotal: line.subtotal(),
                }
            })
            .collect();

        Self {
            id: order.id,
            customer_id: order.customer_id,
            customer_name: customer.name.clone(),
            order_date: order.order_date,
            status: order.status,
            total_price: order.total_price,
            product_count: order.product_count(),
            products,
            updated_at: order.updated_at,
        }
    }
}
