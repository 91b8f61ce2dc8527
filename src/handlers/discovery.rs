//! Discovery handlers: exposed schemas and tables.

use crate::error::AppError;
use crate::response::{success_many, success_one_ok, ListBody, RowBody};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/schemas",
    tag = "discovery",
    responses((status = 200, description = "Valid schemas", body = ListBody))
)]
pub async fn schemas(State(state): State<AppState>) -> impl IntoResponse {
    success_many(CrudService::schemas(&state.pool, &state.access))
}

#[utoipa::path(
    get,
    path = "/tables/{schema}",
    tag = "discovery",
    params(("schema" = String, Path, description = "Schema name")),
    responses((status = 200, description = "Exposed tables of the schema; empty for an unknown schema", body = ListBody))
)]
pub async fn tables_by_schema(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tables = CrudService::tables(&state.pool, &state.access, &schema).await?;
    Ok(success_many(tables))
}

#[utoipa::path(
    get,
    path = "/tables",
    tag = "discovery",
    responses((status = 200, description = "Exposed tables keyed by schema", body = RowBody))
)]
pub async fn all_tables(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tables = CrudService::all_tables(&state.pool, &state.access).await?;
    Ok(success_one_ok(tables))
}
