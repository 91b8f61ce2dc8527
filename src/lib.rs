//! Dynamic API: catalog-driven CRUD REST backend over arbitrary PostgreSQL tables.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::{Catalog, ColumnMetadata, ForeignKeyMetadata, TableIdentifier, TableMeta};
pub use config::{AccessConfig, Settings};
pub use error::{AppError, ConfigError};
pub use response::{success_many, success_one, success_one_ok};
pub use routes::{api_routes, common_routes_with_ready, discovery_routes, table_routes};
pub use service::CrudService;
pub use state::AppState;
