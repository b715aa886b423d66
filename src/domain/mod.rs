// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// Inventory has no handler of its own; the order workflow drives its ledger
// inside the order's session.
//
// ============================================================================

pub mod customer;
pub mod product;
pub mod order;
pub mod inventory;
