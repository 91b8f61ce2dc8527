//! Typed values that sqlx can bind, produced by coercing textual request input.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value bound to a PostgreSQL query. Placeholders are always cast to the column's
/// catalog type, so `Text` and `Json` can stand in for uuid, enum, jsonb and the like.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Int(i64),
    Decimal(BigDecimal),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    /// Already-valid JSON text.
    Json(String),
    Text(String),
}

impl TypedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) | TypedValue::Json(s) => Some(s),
            _ => None,
        }
    }
}

impl<'q> Encode<'q, Postgres> for TypedValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            TypedValue::Int(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            TypedValue::Decimal(d) => <BigDecimal as Encode<Postgres>>::encode_by_ref(d, buf)?,
            TypedValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            TypedValue::Date(d) => <NaiveDate as Encode<Postgres>>::encode_by_ref(d, buf)?,
            TypedValue::Timestamp(t) => <NaiveDateTime as Encode<Postgres>>::encode_by_ref(t, buf)?,
            TypedValue::Time(t) => <NaiveTime as Encode<Postgres>>::encode_by_ref(t, buf)?,
            TypedValue::Json(s) | TypedValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            TypedValue::Json(_) | TypedValue::Text(_) => <String as Type<Postgres>>::type_info(),
            TypedValue::Int(_) => <i64 as Type<Postgres>>::type_info(),
            TypedValue::Decimal(_) => <BigDecimal as Type<Postgres>>::type_info(),
            TypedValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            TypedValue::Date(_) => <NaiveDate as Type<Postgres>>::type_info(),
            TypedValue::Timestamp(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
            TypedValue::Time(_) => <NaiveTime as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for TypedValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}
