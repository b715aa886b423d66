// ============================================================================
// Postgres schema
// ============================================================================
//
// Deletion policy: a customer's orders are cascaded away with the customer;
// a product that appears on any order line cannot be deleted (RESTRICT).
//
// ============================================================================

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS customers (
        id      BIGSERIAL PRIMARY KEY,
        name    VARCHAR(100) NOT NULL,
        email   VARCHAR(100) NOT NULL,
        phone   VARCHAR(20)  NOT NULL DEFAULT '',
        CONSTRAINT customers_email_key UNIQUE (email)
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id          BIGSERIAL PRIMARY KEY,
        name        VARCHAR(100)     NOT NULL,
        description VARCHAR(500)     NOT NULL DEFAULT '',
        price       DOUBLE PRECISION NOT NULL,
        stock       INTEGER          NOT NULL,
        created_at  TIMESTAMPTZ      NOT NULL,
        updated_at  TIMESTAMPTZ,
        CONSTRAINT products_price_check CHECK (price >= 0),
        CONSTRAINT products_stock_check CHECK (stock >= 0)
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id          BIGSERIAL PRIMARY KEY,
        customer_id BIGINT           NOT NULL REFERENCES customers (id) ON DELETE CASCADE,
        order_date  TIMESTAMPTZ      NOT NULL,
        status      INTEGER          NOT NULL,
        total_price DOUBLE PRECISION NOT NULL,
        updated_at  TIMESTAMPTZ,
        CONSTRAINT orders_status_check CHECK (status BETWEEN 0 AND 4)
    )",
    "CREATE TABLE IF NOT EXISTS order_line_items (
        order_id   BIGINT           NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        product_id BIGINT           NOT NULL REFERENCES products (id) ON DELETE RESTRICT,
        line_no    INTEGER          NOT NULL,
        quantity   INTEGER          NOT NULL,
        unit_price DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (order_id, product_id),
        CONSTRAINT order_line_items_quantity_check CHECK (quantity > 0)
    )",
    "CREATE INDEX IF NOT EXISTS orders_customer_id_idx ON orders (customer_id)",
    "CREATE INDEX IF NOT EXISTS order_line_items_product_id_idx ON order_line_items (product_id)",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> &'static str {
        SCHEMA
            .iter()
            .find(|stmt| stmt.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", name)))
            .copied()
            .unwrap()
    }

    #[test]
    fn test_stock_and_price_are_guarded_by_checks() {
        let products = table("products");
        assert!(products.contains("CHECK (stock >= 0)"));
        assert!(products.contains("CHECK (price >= 0)"));
    }

    #[test]
    fn test_deletion_policy() {
        assert!(table("orders").contains("REFERENCES customers (id) ON DELETE CASCADE"));
        let lines = table("order_line_items");
        assert!(lines.contains("REFERENCES orders (id) ON DELETE CASCADE"));
        assert!(lines.contains("REFERENCES products (id) ON DELETE RESTRICT"));
        assert!(lines.contains("PRIMARY KEY (order_id, product_id)"));
    }

    #[test]
    fn test_email_is_unique() {
        assert!(table("customers").contains("UNIQUE (email)"));
    }

    #[test]
    fn test_tables_are_created_before_dependents() {
        let position = |name: &str| {
            SCHEMA
                .iter()
                .position(|stmt| stmt.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", name)))
                .unwrap()
        };
        assert!(position("customers") < position("orders"));
        assert!(position("products") < position("order_line_items"));
        assert!(position("orders") < position("order_line_items"));
    }
}
