//! HTTP handlers for table CRUD and discovery.

pub mod discovery;
pub mod table;
pub use discovery::*;
pub use table::*;
