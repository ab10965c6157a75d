//! Routers the host application merges.

mod common;
mod dispatch;

pub use common::common_routes_with_ready;
pub use dispatch::dispatch_routes;
