//! Discovery routes.

use crate::handlers::discovery::{all_tables, schemas, tables_by_schema};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn discovery_routes(state: AppState) -> Router {
    Router::new()
        .route("/schemas", get(schemas))
        .route("/tables", get(all_tables))
        .route("/tables/:schema", get(tables_by_schema))
        .with_state(state)
}
