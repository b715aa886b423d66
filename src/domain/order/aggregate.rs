use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::OrderStatus;

// ============================================================================
// Order Aggregate
// ============================================================================
//
// Invariant: total_price == Σ(unit_price × quantity) over line_items, with
// unit_price being the price snapshot taken when stock was reserved. Line
// items never change after the order is persisted; only status and
// updated_at do.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
}

impl OrderLineItem {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_price: f64,
    pub updated_at: Option<DateTime<Utc>>,
    pub line_items: Vec<OrderLineItem>,
}

impl Order {
    /// Attach a storage-assigned id to a staged order.
    pub fn from_new(id: i64, new: NewOrder) -> Self {
        Self {
            id,
            customer_id: new.customer_id,
            order_date: new.order_date,
            status: new.status,
            total_price: new.total_price,
            updated_at: None,
            line_items: new
                .line_items
                .into_iter()
                .map(|line| OrderLineItem {
                    order_id: id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }

    /// Any status may follow any other.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = Some(now);
    }

    pub fn product_count(&self) -> usize {
        self.line_items.len()
    }
}

/// A line item not yet bound to an order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
}

/// An order assembled by the workflow, waiting for its id at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: i64,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_price: f64,
    pub line_items: Vec<NewOrderLine>,
}

impl NewOrder {
    pub fn pending(customer_id: i64, order_date: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            order_date,
            status: OrderStatus::Pending,
            total_price: 0.0,
            line_items: Vec::new(),
        }
    }

    /// Record a reserved quantity at its snapshot price.
    ///
    /// Lines for a product already present are merged, since a product
    /// appears at most once per order.
    pub fn add_line(&mut self, product_id: i64, quantity: i32, unit_price: f64) {
        self.total_price += unit_price * f64::from(quantity);

        match self
            .line_items
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            Some(line) => line.quantity += quantity,
            None => self.line_items.push(NewOrderLine {
                product_id,
                quantity,
                unit_price,
            }),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_starts_pending_and_empty() {
        let order = NewOrder::pending(1, Utc::now());
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, 0.0);
        assert!(order.line_items.is_empty());
    }

    #[test]
    fn test_total_is_sum_of_snapshot_subtotals() {
        let mut order = NewOrder::pending(1, Utc::now());
        order.add_line(1, 2, 30.0);
        order.add_line(2, 1, 30.0);

        assert_eq!(order.total_price, 90.0);
        assert_eq!(order.line_items.len(), 2);
    }

    #[test]
    fn test_repeated_product_lines_are_merged() {
        let mut order = NewOrder::pending(1, Utc::now());
        order.add_line(4, 1, 500.0);
        order.add_line(5, 1, 250.0);
        order.add_line(4, 2, 500.0);

        assert_eq!(order.line_items.len(), 2);
        assert_eq!(order.line_items[0].quantity, 3);
        assert_eq!(order.total_price, 1750.0);
    }

    #[test]
    fn test_from_new_binds_line_items_to_order_id() {
        let mut new = NewOrder::pending(2, Utc::now());
        new.add_line(1, 1, 1200.0);

        let order = Order::from_new(42, new);
        assert_eq!(order.id, 42);
        assert_eq!(order.line_items[0].order_id, 42);
        assert_eq!(order.line_items[0].subtotal(), 1200.0);
        assert!(order.updated_at.is_none());
        assert_eq!(order.product_count(), 1);
    }

    #[test]
    fn test_any_status_transition_is_allowed() {
        let mut new = NewOrder::pending(1, Utc::now());
        new.add_line(1, 1, 10.0);
        let mut order = Order::from_new(1, new);

        let now = Utc::now();
        order.set_status(OrderStatus::Cancelled, now);
        order.set_status(OrderStatus::Pending, now);
        order.set_status(OrderStatus::Delivered, now);

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.updated_at, Some(now));
    }
}
