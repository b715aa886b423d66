// ============================================================================
// Product (Catalog) Domain
// ============================================================================

pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
