//! Routers. `api_routes` merges everything the server exposes.

mod common;
mod discovery;
mod table;
pub use common::common_routes_with_ready;
pub use discovery::discovery_routes;
pub use table::{table_routes, BODY_LIMIT_BYTES};

use crate::state::AppState;
use axum::Router;

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(discovery_routes(state.clone()))
        .merge(table_routes(state))
}
