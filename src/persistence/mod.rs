// ============================================================================
// Persistence Gateway
// ============================================================================
//
// - unit_of_work: Store / UnitOfWork / repository contracts, PersistenceError
// - memory:       in-process backend with row locks and atomic commit
// - postgres:     sqlx backend (transactions + SELECT ... FOR UPDATE)
// - schema:       Postgres DDL
// - seed:         demo catalog and customers
//
// ============================================================================

mod unit_of_work;
mod memory;
mod postgres;
mod schema;
mod seed;

pub use unit_of_work::*;
pub use memory::{InMemorySession, InMemoryStore};
pub use postgres::{PgStore, PgUnitOfWork};
pub use schema::SCHEMA;
pub use seed::seed_demo_data;
