// ============================================================================
// Customer Domain
// ============================================================================
//
// - Value objects (Email, PhoneNumber)
// - Commands (CustomerDetails)
// - Errors (CustomerError)
// - Aggregate (Customer)
// - Command Handler (CustomerCommandHandler: register/update/delete/queries)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
