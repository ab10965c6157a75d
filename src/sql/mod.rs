//! Safe SQL builder: identifiers checked and quoted, values as parameters.

mod builder;
mod ident;
pub mod params;
mod table;
pub use builder::*;
pub use ident::*;
pub use params::*;
pub use table::*;
