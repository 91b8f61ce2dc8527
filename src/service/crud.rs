//! Generic CRUD over any exposed table: resolve metadata, validate, build SQL, execute, render rows.

use crate::catalog::{mentions_code, Catalog, CheckConstraint, ColumnMetadata, TableIdentifier, TableMeta};
use crate::config::AccessConfig;
use crate::error::AppError;
use crate::extractors::RequestOrigin;
use crate::service::validation::ConstraintValidator;
use crate::sql::{
    build_count_by_key, build_delete, build_fk_values, build_insert, build_search, build_select_all,
    build_select_by_key, build_update, coerce_for_column, coerce_payload, parse_filters, raw_text, QueryBuf,
    TypedValue, TIMESTAMP_FORMAT,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::PgPool;
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const SYSTEM_USER: &str = "System";
pub const DEFAULT_STATUS: &str = "ACTIVE";
const STATUS_COLUMN: &str = "status";

/// One entry of a foreign-key selection list.
#[derive(Debug, Serialize, ToSchema)]
pub struct FkValue {
    pub id: Option<String>,
    pub value: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Modify,
}

impl WriteKind {
    fn prefix(self) -> &'static str {
        match self {
            WriteKind::Create => "created",
            WriteKind::Modify => "modified",
        }
    }
}

/// Fill `<created|modified>_{by,date,ip_addr,uri}` for the columns the table has, and default
/// `status` on insert. Caller-supplied values for the audit columns are overwritten.
pub fn apply_audit_fields(
    meta: &TableMeta,
    payload: &mut Map<String, Value>,
    origin: &RequestOrigin,
    kind: WriteKind,
    now: NaiveDateTime,
) {
    let fields = [
        ("by", Some(SYSTEM_USER.to_string())),
        ("date", Some(now.format(TIMESTAMP_FORMAT).to_string())),
        ("ip_addr", origin.ip.clone()),
        ("uri", Some(origin.uri.clone()).filter(|u| !u.is_empty())),
    ];
    for (suffix, value) in fields {
        let key = format!("{}_{}", kind.prefix(), suffix);
        if let (Some(value), Some(_)) = (value, meta.column(&key)) {
            payload.insert(key, Value::String(value));
        }
    }
    if kind == WriteKind::Create
        && meta.column(STATUS_COLUMN).is_some()
        && payload.get(STATUS_COLUMN).and_then(raw_text).is_none()
    {
        payload.insert(STATUS_COLUMN.to_string(), Value::String(DEFAULT_STATUS.to_string()));
    }
}

/// Uppercase string values of columns whose name mentions "code".
pub fn normalize_row(row: &mut Value) {
    if let Value::Object(map) = row {
        for (name, value) in map.iter_mut() {
            if let Value::String(s) = value {
                if mentions_code(name) {
                    *s = s.to_uppercase();
                }
            }
        }
    }
}

/// Primary-key value for lookups, converted to the key column's type.
fn key_value(pk: &ColumnMetadata, id: &str) -> Result<TypedValue, AppError> {
    coerce_for_column(id, pk)
}

fn conflict(e: sqlx::Error) -> AppError {
    let message = match &e {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    };
    tracing::warn!(error = %e, "mutation rejected by database");
    AppError::Conflict(message)
}

pub struct CrudService;

impl CrudService {
    /// Metadata for `schema.table` once both names pass the allow-lists.
    pub async fn resolve(
        pool: &PgPool,
        access: &AccessConfig,
        schema: &str,
        table: &str,
    ) -> Result<TableMeta, AppError> {
        if !access.is_valid_schema(schema) {
            tracing::warn!(schema, "request for unknown schema rejected");
            return Err(AppError::Configuration(format!("unknown schema: {}", schema)));
        }
        let catalog = Catalog::new(pool);
        let tables = catalog.get_tables_by_schema(schema, access).await?;
        if !tables.iter().any(|t| t == table) {
            tracing::warn!(schema, table, "request for unexposed table rejected");
            return Err(AppError::NotFound(format!("unknown table: {}.{}", schema, table)));
        }
        catalog.describe(&TableIdentifier::new(schema, table)).await
    }

    pub fn schemas(pool: &PgPool, access: &AccessConfig) -> Vec<String> {
        Catalog::new(pool).get_all_schemas(access)
    }

    /// Exposed tables of `schema`; empty when the schema is not valid.
    pub async fn tables(pool: &PgPool, access: &AccessConfig, schema: &str) -> Result<Vec<String>, AppError> {
        if !access.is_valid_schema(schema) {
            return Ok(Vec::new());
        }
        Catalog::new(pool).get_tables_by_schema(schema, access).await
    }

    pub async fn all_tables(pool: &PgPool, access: &AccessConfig) -> Result<BTreeMap<String, Vec<String>>, AppError> {
        Catalog::new(pool).get_all_tables(access).await
    }

    pub async fn list_all(pool: &PgPool, meta: &TableMeta) -> Result<Vec<Value>, AppError> {
        tracing::info!(table = %meta.ident, "list rows");
        let q = build_select_all(meta);
        let mut rows = Self::query_many(pool, meta, &q).await?;
        rows.iter_mut().for_each(normalize_row);
        Ok(rows)
    }

    /// Rows matching the primary key (zero or one).
    pub async fn read_by_id(pool: &PgPool, meta: &TableMeta, id: &str) -> Result<Vec<Value>, AppError> {
        tracing::info!(table = %meta.ident, id, "read row");
        let pk = meta.primary_key()?;
        let q = build_select_by_key(meta, pk, key_value(pk, id)?);
        let mut rows = Self::query_many(pool, meta, &q).await?;
        rows.iter_mut().for_each(normalize_row);
        Ok(rows)
    }

    /// Rows matching every `(column, value)` filter; values may carry a leading comparison operator.
    pub async fn search(pool: &PgPool, meta: &TableMeta, params: &[(String, String)]) -> Result<Vec<Value>, AppError> {
        tracing::info!(table = %meta.ident, filters = params.len(), "search rows");
        let filters = parse_filters(params);
        let q = build_search(meta, &filters)?;
        Self::query_many(pool, meta, &q).await
    }

    /// `id`/`value` pairs from the table referenced by foreign key `column`.
    pub async fn fk_values(pool: &PgPool, meta: &TableMeta, column: &str) -> Result<Vec<FkValue>, AppError> {
        let fk = meta
            .foreign_keys
            .iter()
            .find(|fk| fk.fk_column == column)
            .ok_or_else(|| AppError::Configuration(format!("{} is not a foreign key of {}", column, meta.ident)))?;
        let q = build_fk_values(fk);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query_as::<_, (Option<String>, Option<String>)>(&q.sql)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(|(id, value)| FkValue { id, value }).collect())
    }

    pub async fn constraints(pool: &PgPool, meta: &TableMeta) -> Result<Vec<CheckConstraint>, AppError> {
        Catalog::new(pool)
            .get_check_constraints(&meta.ident.schema, &meta.ident.table)
            .await
    }

    pub async fn check_values(pool: &PgPool, meta: &TableMeta, column: &str) -> Result<Vec<String>, AppError> {
        if meta.column(column).is_none() {
            return Err(AppError::Configuration(format!("unknown column {} for {}", column, meta.ident)));
        }
        Catalog::new(pool)
            .get_check_values(&meta.ident.schema, &meta.ident.table, column)
            .await
    }

    /// Validate and insert one row. Returns the stored row.
    pub async fn insert(
        pool: &PgPool,
        meta: &TableMeta,
        mut payload: Map<String, Value>,
        origin: &RequestOrigin,
    ) -> Result<Value, AppError> {
        tracing::info!(table = %meta.ident, "insert row");
        let pk = meta.primary_key()?;
        ConstraintValidator::validate_foreign_keys(pool, &meta.foreign_keys, &payload).await?;
        ConstraintValidator::validate_unique_codes(pool, meta, &payload, None).await?;
        apply_audit_fields(meta, &mut payload, origin, WriteKind::Create, chrono::Utc::now().naive_utc());
        let values = coerce_payload(meta, &payload, &[pk.name.as_str()])?;
        let q = build_insert(meta, &values)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = Self::bind(sqlx::query(&q.sql), &q)
            .fetch_one(pool)
            .await
            .map_err(conflict)?;
        row_to_json(meta, &row)
    }

    /// Validate and update the row with primary key `id`. Returns the stored row.
    pub async fn update(
        pool: &PgPool,
        meta: &TableMeta,
        id: &str,
        mut payload: Map<String, Value>,
        origin: &RequestOrigin,
    ) -> Result<Value, AppError> {
        tracing::info!(table = %meta.ident, id, "update row");
        let pk = meta.primary_key()?;
        if pk.normalized_type == "uuid" && uuid::Uuid::parse_str(id.trim()).is_err() {
            return Err(AppError::NotFound(format!("{} is invalid GUID: {}", pk.name, id)));
        }
        let key = key_value(pk, id)?;
        let count: i64 = fetch_scalar(pool, &build_count_by_key(meta, pk, key.clone())).await?;
        if count == 0 {
            return Err(AppError::NotFound(format!("record not found for ID: {}", id)));
        }
        ConstraintValidator::validate_foreign_keys(pool, &meta.foreign_keys, &payload).await?;
        ConstraintValidator::validate_unique_codes(pool, meta, &payload, Some((pk, key.clone()))).await?;
        apply_audit_fields(meta, &mut payload, origin, WriteKind::Modify, chrono::Utc::now().naive_utc());
        let values = coerce_payload(meta, &payload, &[pk.name.as_str()])?;
        let q = build_update(meta, &values, pk, key)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = Self::bind(sqlx::query(&q.sql), &q)
            .fetch_optional(pool)
            .await
            .map_err(conflict)?
            .ok_or_else(|| AppError::NotFound(format!("record not found for ID: {}", id)))?;
        row_to_json(meta, &row)
    }

    /// Delete by primary key. Returns the number of rows removed.
    pub async fn delete(pool: &PgPool, meta: &TableMeta, id: &str) -> Result<u64, AppError> {
        tracing::info!(table = %meta.ident, id, "delete row");
        let pk = meta.primary_key()?;
        let q = build_delete(meta, pk, key_value(pk, id)?);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let result = Self::bind(sqlx::query(&q.sql), &q)
            .execute(pool)
            .await
            .map_err(conflict)?;
        Ok(result.rows_affected())
    }

    async fn query_many(pool: &PgPool, meta: &TableMeta, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = Self::bind(sqlx::query(&q.sql), q).fetch_all(pool).await?;
        rows.iter().map(|r| row_to_json(meta, r)).collect()
    }

    fn bind<'q>(
        mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
        q: &QueryBuf,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query
    }
}

/// Single value of a parameterized query, e.g. `COUNT(*)` or `EXISTS (...)`.
pub(crate) async fn fetch_scalar<T>(pool: &PgPool, q: &QueryBuf) -> Result<T, AppError>
where
    T: Send + Unpin,
    (T,): for<'r> sqlx::FromRow<'r, PgRow>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<_, T>(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    Ok(query.fetch_one(pool).await?)
}

/// Decode a row using the catalog type of each column. The select list already casts
/// anything else to text.
fn row_to_json(meta: &TableMeta, row: &PgRow) -> Result<Value, AppError> {
    use sqlx::{Column, Row};
    let mut map = Map::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let name = col.name();
        let tag = meta.column(name).map(|c| c.normalized_type.as_str()).unwrap_or("text");
        map.insert(name.to_string(), cell_to_value(row, idx, tag)?);
    }
    Ok(Value::Object(map))
}

/// Exact decimal text with the column's scale; a JSON number would go through f64.
fn decimal_to_json(d: &BigDecimal) -> Value {
    Value::String(d.to_string())
}

fn or_null<T: Into<Value>>(v: Option<T>) -> Value {
    v.map(Into::into).unwrap_or(Value::Null)
}

fn cell_to_value(row: &PgRow, idx: usize, tag: &str) -> Result<Value, sqlx::Error> {
    use sqlx::Row;
    Ok(match tag {
        "smallint" => or_null(row.try_get::<Option<i16>, _>(idx)?),
        "integer" => or_null(row.try_get::<Option<i32>, _>(idx)?),
        "bigint" => or_null(row.try_get::<Option<i64>, _>(idx)?),
        "float4" => or_null(row.try_get::<Option<f32>, _>(idx)?),
        "float8" => or_null(row.try_get::<Option<f64>, _>(idx)?),
        "numeric" => or_null(row.try_get::<Option<BigDecimal>, _>(idx)?.as_ref().map(decimal_to_json)),
        "bool" | "boolean" => or_null(row.try_get::<Option<bool>, _>(idx)?),
        "date" => or_null(
            row.try_get::<Option<chrono::NaiveDate>, _>(idx)?
                .map(|d| d.format(crate::sql::DATE_FORMAT).to_string()),
        ),
        "timestamp" => or_null(
            row.try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
        ),
        "timestamp with time zone" => or_null(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
        ),
        "time" => or_null(
            row.try_get::<Option<chrono::NaiveTime>, _>(idx)?
                .map(|t| t.format("%H:%M:%S").to_string()),
        ),
        "json" => row.try_get::<Option<Value>, _>(idx)?.unwrap_or(Value::Null),
        "uuid" => or_null(row.try_get::<Option<uuid::Uuid>, _>(idx)?.map(|u| u.to_string())),
        _ => or_null(row.try_get::<Option<String>, _>(idx)?),
    })
}
