//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and search statements from table metadata.
//! Identifiers are interpolated (quoted) and must come from the catalog; values are always parameters.

use crate::catalog::{mentions_code, ColumnMetadata, ForeignKeyMetadata, TableIdentifier, TableMeta};
use crate::error::AppError;
use crate::sql::{coerce_for_column, ColumnValue, FilterExpression, TypedValue};

/// Canonical types the row decoder reads natively; anything else is selected as text.
const DECODABLE_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "numeric",
    "float4",
    "float8",
    "bool",
    "boolean",
    "date",
    "timestamp",
    "timestamp with time zone",
    "time",
    "json",
    "uuid",
    "varchar",
    "char",
    "text",
];

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(ident: &TableIdentifier) -> String {
    format!("{}.{}", quoted(&ident.schema), quoted(&ident.table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<TypedValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: TypedValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Bind `v` and return its placeholder cast to the column's catalog type.
    fn push_for(&mut self, column: &ColumnMetadata, v: TypedValue) -> String {
        let n = self.push_param(v);
        if column.native_type.is_empty() {
            format!("${}", n)
        } else {
            format!("${}::{}", n, column.native_type)
        }
    }
}

/// SELECT list: natively decodable columns as-is, the rest as `col::text`.
pub fn select_column_list(meta: &TableMeta) -> String {
    meta.columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if DECODABLE_TYPES.contains(&c.normalized_type.as_str()) {
                q
            } else {
                format!("{}::text AS {}", q, q)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_select_all(meta: &TableMeta) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT {} FROM {}", select_column_list(meta), qualified_table(&meta.ident));
    q
}

pub fn build_select_by_key(meta: &TableMeta, pk: &ColumnMetadata, id: TypedValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_for(pk, id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(meta),
        qualified_table(&meta.ident),
        quoted(&pk.name),
        ph
    );
    q
}

pub fn build_count_by_key(meta: &TableMeta, pk: &ColumnMetadata, id: TypedValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_for(pk, id);
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = {}",
        qualified_table(&meta.ident),
        quoted(&pk.name),
        ph
    );
    q
}

/// INSERT of the given columns, returning the stored row.
pub fn build_insert(meta: &TableMeta, values: &[ColumnValue<'_>]) -> Result<QueryBuf, AppError> {
    if values.is_empty() {
        return Err(AppError::Configuration(format!(
            "no insertable columns provided for {}",
            meta.ident
        )));
    }
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for cv in values {
        cols.push(quoted(&cv.column.name));
        placeholders.push(q.push_for(cv.column, cv.value.clone()));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(&meta.ident),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(meta)
    );
    Ok(q)
}

/// UPDATE by primary key: SET only the given columns, returning the stored row.
pub fn build_update(
    meta: &TableMeta,
    values: &[ColumnValue<'_>],
    pk: &ColumnMetadata,
    id: TypedValue,
) -> Result<QueryBuf, AppError> {
    if values.is_empty() {
        return Err(AppError::Configuration(format!(
            "no updatable columns provided for {}",
            meta.ident
        )));
    }
    let mut q = QueryBuf::new();
    let sets: Vec<String> = values
        .iter()
        .map(|cv| format!("{} = {}", quoted(&cv.column.name), q.push_for(cv.column, cv.value.clone())))
        .collect();
    let id_ph = q.push_for(pk, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(&meta.ident),
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        select_column_list(meta)
    );
    Ok(q)
}

pub fn build_delete(meta: &TableMeta, pk: &ColumnMetadata, id: TypedValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_for(pk, id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        qualified_table(&meta.ident),
        quoted(&pk.name),
        ph
    );
    q
}

/// Filtered SELECT. Filters are ANDed; code columns compare case-insensitively; other values
/// are converted to the column's type. Filter columns must be catalog columns.
pub fn build_search(meta: &TableMeta, filters: &[FilterExpression]) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut conditions = Vec::with_capacity(filters.len());
    for f in filters {
        let column = meta.column(&f.column).ok_or_else(|| {
            tracing::warn!(table = %meta.ident, column = %f.column, "search on unknown column rejected");
            AppError::Configuration(format!("unknown column {} for {}", f.column, meta.ident))
        })?;
        if mentions_code(&column.name) {
            let n = q.push_param(TypedValue::Text(f.raw_value.trim().to_string()));
            conditions.push(format!(
                "UPPER(CAST({} AS TEXT)) {} UPPER(${})",
                quoted(&column.name),
                f.operator,
                n
            ));
        } else {
            let value = coerce_for_column(&f.raw_value, column)?;
            let ph = q.push_for(column, value);
            conditions.push(format!("{} {} {}", quoted(&column.name), f.operator, ph));
        }
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    q.sql = format!(
        "SELECT {} FROM {}{}",
        select_column_list(meta),
        qualified_table(&meta.ident),
        where_clause
    );
    Ok(q)
}

/// Count referenced rows whose key equals `value`, compared as lowercase text.
pub fn build_reference_count(fk: &ForeignKeyMetadata, value: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(TypedValue::Text(value.to_string()));
    q.sql = format!(
        "SELECT COUNT(*) FROM {} WHERE LOWER(CAST({} AS TEXT)) = LOWER(${})",
        qualified_table(&fk.referenced()),
        quoted(&fk.referenced_column),
        n
    );
    q
}

/// `EXISTS` over rows whose `column` equals `value` case-insensitively, optionally skipping
/// the row with primary key `exclude`.
pub fn build_code_exists(
    ident: &TableIdentifier,
    column: &str,
    value: &str,
    exclude: Option<(&ColumnMetadata, TypedValue)>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(TypedValue::Text(value.to_string()));
    let mut sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE UPPER({}) = UPPER(${})",
        qualified_table(ident),
        quoted(column),
        n
    );
    if let Some((pk, id)) = exclude {
        let ph = q.push_for(pk, id);
        sql.push_str(&format!(" AND {} <> {}", quoted(&pk.name), ph));
    }
    sql.push(')');
    q.sql = sql;
    q
}

/// `id`/`value` pairs from the referenced table of `fk`.
pub fn build_fk_values(fk: &ForeignKeyMetadata) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT CAST({} AS TEXT) AS id, CAST({} AS TEXT) AS value FROM {}",
        quoted(&fk.referenced_column),
        quoted(fk.display_or_key()),
        qualified_table(&fk.referenced())
    );
    q
}
