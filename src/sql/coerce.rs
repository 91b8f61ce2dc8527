//! Convert textual request input into a typed bind value for a column's canonical type.
//!
//! Any column whose name contains "code" is uppercased before conversion, whatever its type.

use crate::catalog::{mentions_code, ColumnMetadata, TableMeta};
use crate::error::AppError;
use crate::sql::TypedValue;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_LITERAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Converts an already trimmed (and possibly uppercased) string. `Err` carries nothing: the
/// caller knows the column and the expected type.
type Coercer = fn(&str) -> Result<TypedValue, ()>;

/// Canonical type tag -> conversion. Tags not listed fall through to `coerce_text`.
static COERCERS: &[(&str, Coercer)] = &[
    ("smallint", coerce_integer),
    ("integer", coerce_integer),
    ("bigint", coerce_integer),
    ("serial", coerce_integer),
    ("bigserial", coerce_integer),
    ("numeric", coerce_decimal),
    ("decimal", coerce_decimal),
    ("boolean", coerce_bool),
    ("bool", coerce_bool),
    ("date", coerce_date),
    ("timestamp", coerce_timestamp),
    ("timestamptz", coerce_timestamp),
    ("timestamp with time zone", coerce_timestamp),
    ("timestamp without time zone", coerce_timestamp),
    ("time", coerce_time),
    ("timetz", coerce_time),
    ("time with time zone", coerce_time),
    ("time without time zone", coerce_time),
    ("json", coerce_json),
    ("jsonb", coerce_json),
    ("uuid", coerce_uuid),
];

fn coercer_for(canonical_type: &str) -> Coercer {
    COERCERS
        .iter()
        .find(|(tag, _)| *tag == canonical_type)
        .map(|(_, f)| *f)
        .unwrap_or(coerce_text)
}

pub fn coerce(raw: &str, canonical_type: &str, column: &str) -> Result<TypedValue, AppError> {
    let mut value = raw.trim().to_string();
    if mentions_code(column) {
        value = value.to_uppercase();
    }
    let tag = canonical_type.trim().to_lowercase();
    coercer_for(&tag)(&value).map_err(|()| AppError::Conversion {
        column: column.to_string(),
        value: raw.to_string(),
        expected: tag,
    })
}

pub fn coerce_for_column(raw: &str, column: &ColumnMetadata) -> Result<TypedValue, AppError> {
    coerce(raw, &column.normalized_type, &column.name)
}

fn coerce_integer(s: &str) -> Result<TypedValue, ()> {
    s.parse::<i64>().map(TypedValue::Int).map_err(|_| ())
}

fn coerce_decimal(s: &str) -> Result<TypedValue, ()> {
    BigDecimal::from_str(s).map(TypedValue::Decimal).map_err(|_| ())
}

fn coerce_bool(s: &str) -> Result<TypedValue, ()> {
    if s.eq_ignore_ascii_case("true") {
        Ok(TypedValue::Bool(true))
    } else if s.eq_ignore_ascii_case("false") {
        Ok(TypedValue::Bool(false))
    } else {
        Err(())
    }
}

fn coerce_date(s: &str) -> Result<TypedValue, ()> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map(TypedValue::Date).map_err(|_| ())
}

/// `yyyy-MM-ddTHH:mm:ss` with any fraction cut off; failing that, `T` -> space as a timestamp literal.
fn coerce_timestamp(s: &str) -> Result<TypedValue, ()> {
    let head = s.split('.').next().unwrap_or(s);
    if let Ok(t) = NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT) {
        return Ok(TypedValue::Timestamp(t));
    }
    NaiveDateTime::parse_from_str(&s.replace('T', " "), TIMESTAMP_LITERAL_FORMAT)
        .map(TypedValue::Timestamp)
        .map_err(|_| ())
}

fn coerce_time(s: &str) -> Result<TypedValue, ()> {
    let head = s.split('+').next().unwrap_or(s);
    NaiveTime::parse_from_str(head, TIME_FORMAT).map(TypedValue::Time).map_err(|_| ())
}

fn coerce_json(s: &str) -> Result<TypedValue, ()> {
    if s.starts_with('{') || s.starts_with('[') {
        Ok(TypedValue::Json(s.to_string()))
    } else if s.eq_ignore_ascii_case("null") {
        Ok(TypedValue::Json("null".to_string()))
    } else {
        Ok(TypedValue::Json(Value::String(s.to_string()).to_string()))
    }
}

/// Must be a well-formed uuid; bound as text and cast by the placeholder.
fn coerce_uuid(s: &str) -> Result<TypedValue, ()> {
    uuid::Uuid::parse_str(s).map(|_| TypedValue::Text(s.to_string())).map_err(|_| ())
}

fn coerce_text(s: &str) -> Result<TypedValue, ()> {
    Ok(TypedValue::Text(s.to_string()))
}

/// Text form of a request body value. `None` for null or blank, which callers skip.
pub fn raw_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// One column to write and its converted value.
#[derive(Clone, Debug)]
pub struct ColumnValue<'a> {
    pub column: &'a ColumnMetadata,
    pub value: TypedValue,
}

/// Convert every writable payload entry in catalog column order. Columns absent from the
/// payload or blank after trimming are dropped, as are the excluded ones (primary key).
pub fn coerce_payload<'a>(
    meta: &'a TableMeta,
    payload: &serde_json::Map<String, Value>,
    exclude: &[&str],
) -> Result<Vec<ColumnValue<'a>>, AppError> {
    let mut out = Vec::new();
    for column in &meta.columns {
        if exclude.contains(&column.name.as_str()) {
            continue;
        }
        let Some(raw) = payload.get(&column.name).and_then(raw_text) else { continue };
        let value = coerce_for_column(&raw, column)?;
        out.push(ColumnValue { column, value });
    }
    Ok(out)
}
