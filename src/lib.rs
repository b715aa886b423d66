// ============================================================================
// storefront_orders - order placement with stock reservation
// ============================================================================
//
// - domain:      customers, products, inventory ledger, order workflow engine
// - persistence: unit-of-work gateway with in-memory and Postgres backends
// - metrics:     Prometheus registry and HTTP exposition
// - config:      environment-driven settings
// - utils:       retry with exponential backoff
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod metrics;
pub mod persistence;
pub mod utils;
