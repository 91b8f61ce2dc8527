//! SQL construction: identifiers come from the catalog, values are bound as typed parameters.

mod builder;
pub mod coerce;
pub mod filter;
pub mod params;
pub use builder::*;
pub use coerce::*;
pub use filter::*;
pub use params::*;
