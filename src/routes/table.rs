//! Table routes. Static segments (`columns`, `search`, `constraints`) take precedence over `:id`.

use crate::handlers::table::{
    check_values, columns, constraints, create, delete as delete_handler, fk_values, list, read, search, update,
};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

pub fn table_routes(state: AppState) -> Router {
    Router::new()
        .route("/:schema/:table", get(list).post(create))
        .route("/:schema/:table/columns", get(columns))
        .route("/:schema/:table/search", get(search))
        .route("/:schema/:table/constraints", get(constraints))
        .route("/:schema/:table/fk-values/:column", get(fk_values))
        .route("/:schema/:table/check/:column", get(check_values))
        .route(
            "/:schema/:table/:id",
            get(read).put(update).delete(delete_handler),
        )
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
