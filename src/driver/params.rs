//! Conversion between `sea-query` parameters / Postgres rows and crate values.

use super::Row;
use crate::error::BackendError;
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres_types::{to_sql_checked, IsNull, ToSql, Type};
use rust_decimal::Decimal;
use std::error::Error;

type BoxError = Box<dyn Error + Sync + Send>;

/// Binds one `sea_query::Value` to whatever parameter type the server
/// inferred for its placeholder.
///
/// Integers are narrowed or widened to the column type, so a `BIGINT` bound
/// against an `INT4` column still works. Every null binds as SQL `NULL`.
#[derive(Debug)]
pub struct Param<'a>(pub &'a sea_query::Value);

fn bind_integer(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(value).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (value as f64).to_sql(ty, out)
    } else if *ty == Type::BOOL {
        (value != 0).to_sql(ty, out)
    } else {
        value.to_sql(ty, out)
    }
}

impl ToSql for Param<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        use sea_query::Value as V;

        match self.0 {
            V::Bool(Some(b)) => b.to_sql(ty, out),
            V::TinyInt(Some(i)) => bind_integer(i64::from(*i), ty, out),
            V::SmallInt(Some(i)) => bind_integer(i64::from(*i), ty, out),
            V::Int(Some(i)) => bind_integer(i64::from(*i), ty, out),
            V::BigInt(Some(i)) => bind_integer(*i, ty, out),
            V::TinyUnsigned(Some(u)) => bind_integer(i64::from(*u), ty, out),
            V::SmallUnsigned(Some(u)) => bind_integer(i64::from(*u), ty, out),
            V::Unsigned(Some(u)) => bind_integer(i64::from(*u), ty, out),
            V::BigUnsigned(Some(u)) => bind_integer(i64::try_from(*u)?, ty, out),
            V::Double(Some(d)) => d.to_sql(ty, out),
            V::String(Some(s)) => {
                let s: &str = s;
                s.to_sql(ty, out)
            }
            V::Decimal(Some(d)) => {
                let d: &Decimal = d;
                d.to_sql(ty, out)
            }
            V::ChronoDateTime(Some(dt)) => {
                let dt: &NaiveDateTime = dt;
                dt.to_sql(ty, out)
            }
            V::Json(Some(json)) => {
                let json: &serde_json::Value = json;
                json.to_sql(ty, out)
            }
            V::Bool(None)
            | V::TinyInt(None)
            | V::SmallInt(None)
            | V::Int(None)
            | V::BigInt(None)
            | V::TinyUnsigned(None)
            | V::SmallUnsigned(None)
            | V::Unsigned(None)
            | V::BigUnsigned(None)
            | V::Double(None)
            | V::String(None)
            | V::Decimal(None)
            | V::ChronoDateTime(None)
            | V::Json(None) => Ok(IsNull::Yes),
            other => Err(format!("unsupported parameter value {other:?}").into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Wrap statement values for `may_postgres`.
pub fn params(values: &sea_query::Values) -> Vec<Param<'_>> {
    values.iter().map(Param).collect()
}

fn decode_column(row: &may_postgres::Row, idx: usize, ty: &Type) -> Result<Value, BackendError> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)?.map(Value::Decimal)
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        let float = if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)?.map(f64::from)
        } else {
            row.try_get::<_, Option<f64>>(idx)?
        };
        match float {
            Some(f) => Some(Value::Decimal(
                Decimal::try_from(f).map_err(|e| BackendError::Decode(e.to_string()))?,
            )),
            None => None,
        }
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?.map(Value::DateTime)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|dt| Value::DateTime(dt.naive_utc()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::DateTime)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|json| Value::String(json.to_string()))
    } else if <String as postgres_types::FromSql>::accepts(ty) {
        row.try_get::<_, Option<String>>(idx)?.map(Value::String)
    } else {
        return Err(BackendError::Decode(format!(
            "unsupported column type '{}' at position {idx}",
            ty.name()
        )));
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Decode a Postgres row into column name → value.
pub fn decode_row(row: &may_postgres::Row) -> Result<Row, BackendError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| Ok((column.name().to_string(), decode_column(row, idx, column.type_())?)))
        .collect()
}
