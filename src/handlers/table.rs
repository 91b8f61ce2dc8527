//! Table handlers: rows, search, metadata, selection lists, insert, update, delete.

use crate::catalog::{CheckConstraint, ColumnMetadata};
use crate::error::{AppError, ErrorBody};
use crate::extractors::RequestOrigin;
use crate::response::{success_many, success_one, success_one_ok, Deleted, ListBody, RowBody};
use crate::service::{CrudService, FkValue};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct TablePath {
    /// Schema name; must be in the valid-schema list.
    pub schema: String,
    /// Table name; must be exposed for the schema.
    pub table: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct RowPath {
    pub schema: String,
    pub table: String,
    /// Primary key value.
    pub id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct ColumnPath {
    pub schema: String,
    pub table: String,
    pub column: String,
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}",
    tag = "table",
    params(TablePath),
    responses(
        (status = 200, description = "All rows; code columns uppercased, timestamps as yyyy-MM-ddTHH:mm:ss", body = ListBody),
        (status = 400, description = "Unknown schema", body = ErrorBody),
        (status = 404, description = "Table not exposed", body = ErrorBody)
    )
)]
pub async fn list(
    State(state): State<AppState>,
    Path(TablePath { schema, table }): Path<TablePath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let rows = CrudService::list_all(&state.pool, &meta).await?;
    Ok(success_many(rows))
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}/{id}",
    tag = "table",
    params(RowPath),
    responses(
        (status = 200, description = "Rows matching the primary key", body = ListBody),
        (status = 400, description = "Id does not fit the key type, or no single-column primary key", body = ErrorBody)
    )
)]
pub async fn read(
    State(state): State<AppState>,
    Path(RowPath { schema, table, id }): Path<RowPath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let rows = CrudService::read_by_id(&state.pool, &meta, &id).await?;
    Ok(success_many(rows))
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}/columns",
    tag = "table",
    params(TablePath),
    responses((status = 200, description = "Column metadata in catalog order", body = ListBody))
)]
pub async fn columns(
    State(state): State<AppState>,
    Path(TablePath { schema, table }): Path<TablePath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let columns: Vec<ColumnMetadata> = meta.columns;
    Ok(success_many(columns))
}

/// Every query parameter is a filter `column=[op]value` with op one of `>=`, `<=`, `!=`, `>`, `<`
/// (default `=`). Filters are ANDed.
#[utoipa::path(
    get,
    path = "/{schema}/{table}/search",
    tag = "table",
    params(TablePath),
    responses(
        (status = 200, description = "Rows matching every filter", body = ListBody),
        (status = 400, description = "Unknown filter column or unconvertible value", body = ErrorBody)
    )
)]
pub async fn search(
    State(state): State<AppState>,
    Path(TablePath { schema, table }): Path<TablePath>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let rows = CrudService::search(&state.pool, &meta, &params).await?;
    Ok(success_many(rows))
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}/fk-values/{column}",
    tag = "table",
    params(ColumnPath),
    responses(
        (status = 200, description = "id/value pairs from the referenced table", body = ListBody),
        (status = 400, description = "Column is not a foreign key", body = ErrorBody)
    )
)]
pub async fn fk_values(
    State(state): State<AppState>,
    Path(ColumnPath { schema, table, column }): Path<ColumnPath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let values: Vec<FkValue> = CrudService::fk_values(&state.pool, &meta, &column).await?;
    Ok(success_many(values))
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}/constraints",
    tag = "table",
    params(TablePath),
    responses((status = 200, description = "Check constraint definitions", body = ListBody))
)]
pub async fn constraints(
    State(state): State<AppState>,
    Path(TablePath { schema, table }): Path<TablePath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let defs: Vec<CheckConstraint> = CrudService::constraints(&state.pool, &meta).await?;
    Ok(success_many(defs))
}

#[utoipa::path(
    get,
    path = "/{schema}/{table}/check/{column}",
    tag = "table",
    params(ColumnPath),
    responses((status = 200, description = "Values enumerated by check constraints on the column", body = ListBody))
)]
pub async fn check_values(
    State(state): State<AppState>,
    Path(ColumnPath { schema, table, column }): Path<ColumnPath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let values = CrudService::check_values(&state.pool, &meta, &column).await?;
    Ok(success_many(values))
}

#[utoipa::path(
    post,
    path = "/{schema}/{table}",
    tag = "table",
    params(TablePath),
    responses(
        (status = 201, description = "Inserted row", body = RowBody),
        (status = 404, description = "Foreign key missing, malformed or not found", body = ErrorBody),
        (status = 409, description = "Duplicate code or database conflict", body = ErrorBody)
    )
)]
pub async fn create(
    State(state): State<AppState>,
    Path(TablePath { schema, table }): Path<TablePath>,
    origin: RequestOrigin,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload = body_to_map(body)?;
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let row = CrudService::insert(&state.pool, &meta, payload, &origin).await?;
    Ok(success_one(row))
}

#[utoipa::path(
    put,
    path = "/{schema}/{table}/{id}",
    tag = "table",
    params(RowPath),
    responses(
        (status = 200, description = "Updated row", body = RowBody),
        (status = 404, description = "Invalid or unknown id, or foreign key violation", body = ErrorBody),
        (status = 409, description = "Duplicate code or database conflict", body = ErrorBody)
    )
)]
pub async fn update(
    State(state): State<AppState>,
    Path(RowPath { schema, table, id }): Path<RowPath>,
    origin: RequestOrigin,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload = body_to_map(body)?;
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let row = CrudService::update(&state.pool, &meta, &id, payload, &origin).await?;
    Ok(success_one_ok(row))
}

#[utoipa::path(
    delete,
    path = "/{schema}/{table}/{id}",
    tag = "table",
    params(RowPath),
    responses(
        (status = 200, description = "Number of rows deleted", body = Deleted),
        (status = 409, description = "Row still referenced", body = ErrorBody)
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(RowPath { schema, table, id }): Path<RowPath>,
) -> Result<impl IntoResponse, AppError> {
    let meta = CrudService::resolve(&state.pool, &state.access, &schema, &table).await?;
    let deleted = CrudService::delete(&state.pool, &meta, &id).await?;
    Ok(success_one_ok(Deleted { deleted }))
}
