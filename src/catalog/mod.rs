//! Catalog introspection: columns, keys, foreign keys and check constraints of live tables.

mod introspect;
mod types;
pub use introspect::*;
pub use types::*;
