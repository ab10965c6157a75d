//! Application handler contract and the registry that resolves group names to handlers.

pub mod handler;
pub mod registry;
pub use handler::*;
pub use registry::*;
