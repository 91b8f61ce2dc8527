//! Shared application state for all routes.

use crate::config::AccessConfig;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Schema and table allow/deny lists, fixed at startup.
    pub access: Arc<AccessConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, access: AccessConfig) -> Self {
        AppState {
            pool,
            access: Arc::new(access),
        }
    }
}
