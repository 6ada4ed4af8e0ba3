//! Client adapter: where connections come from and how statements run on
//! them.
//!
//! [`ConnectionSource`] and [`Connection`] are the only places that touch
//! the driver. They are implemented for `sqlx`'s Postgres pool; tests
//! substitute in-memory fakes.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use seaquel_core::{Row, SqlValue};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgPool, PgRow, PgTypeInfo, PgValueFormat, Postgres,
};
use sqlx::query::Query;
use sqlx::types::{JsonValue, Uuid};
use sqlx::{Column, Encode, Row as _, TypeInfo, ValueRef};

/// A boxed future for async connection operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One physical connection. Dropping it releases it.
pub trait Connection: Send {
    /// Runs a statement, returning the number of affected rows.
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>>;

    /// Runs a query, returning every row.
    fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>>;
}

/// Hands out connections, e.g. a pool.
pub trait ConnectionSource: Send + Sync + 'static {
    /// Takes a connection, waiting for one to become free if needed.
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>>;
}

impl ConnectionSource for PgPool {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, sqlx::Error>> {
        Box::pin(async move {
            let connection = PgPool::acquire(self).await?;
            Ok(Box::new(connection) as Box<dyn Connection>)
        })
    }
}

impl Connection for PoolConnection<Postgres> {
    fn execute<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<u64, sqlx::Error>> {
        Box::pin(async move {
            let result = bind_params(sqlx::query(sql), params)
                .execute(&mut **self)
                .await?;
            Ok(result.rows_affected())
        })
    }

    fn fetch<'a>(
        &'a mut self,
        sql: &'a str,
        params: &'a [SqlValue],
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>> {
        Box::pin(async move {
            let rows = bind_params(sqlx::query(sql), params)
                .fetch_all(&mut **self)
                .await?;
            rows.iter().map(decode_row).collect()
        })
    }
}

/// NULL without a type, so the server infers it from context.
///
/// A typed NULL (say, text) would be rejected by a column of another type.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Binds parameters in placeholder order.
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value.clone() {
            SqlValue::Null => query.bind(UntypedNull),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Int(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Timestamp(t) => query.bind(t),
            SqlValue::Blob(b) => query.bind(b),
        };
    }
    query
}

/// Converts a driver row by column type name.
///
/// Text-like, numeric, temporal, UUID and JSON types become native values or
/// their text form. Anything else arrives as the server sent it: text in the
/// text protocol, raw bytes in the binary one.
fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_value(row, column.ordinal(), column.type_info().name())?;
            Ok((String::from(column.name()), value.unwrap_or(SqlValue::Null)))
        })
        .collect()
}

fn decode_value(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> Result<Option<SqlValue>, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(SqlValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text)
        }
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(SqlValue::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|v| SqlValue::Timestamp(v.naive_utc())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)?
            .map(|v| SqlValue::Text(v.to_string())),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(SqlValue::Blob),
        "NUMERIC" => raw_value(row, index, |raw| numeric_to_string(raw).map(SqlValue::Text))?,
        _ => raw_value(row, index, |raw| Ok(SqlValue::Blob(raw.to_vec())))?,
    };
    Ok(value)
}

/// Reads a value without a Rust type: text-format values are taken as
/// text, binary ones are handed to `binary`.
fn raw_value(
    row: &PgRow,
    index: usize,
    binary: impl FnOnce(&[u8]) -> Result<SqlValue, BoxDynError>,
) -> Result<Option<SqlValue>, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(None);
    }
    let value = match raw.format() {
        PgValueFormat::Text => raw.as_str().map(|s| SqlValue::Text(String::from(s))),
        PgValueFormat::Binary => raw.as_bytes().and_then(binary),
    };
    value
        .map(Some)
        .map_err(|source| sqlx::Error::ColumnDecode {
            index: index.to_string(),
            source,
        })
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Renders a binary NUMERIC as its exact decimal text.
///
/// The wire form is a header of four 16-bit words (digit count, weight of
/// the first digit, sign, display scale) followed by base-10000 digits.
fn numeric_to_string(raw: &[u8]) -> Result<String, BoxDynError> {
    let word = |i: usize| -> Result<u16, BoxDynError> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };
    let ndigits = usize::from(word(0)?);
    let weight = i32::from(i16::from_be_bytes(word(1)?.to_be_bytes()));
    let sign = word(2)?;
    let scale = usize::from(word(3)?);
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;

    let negative = match sign {
        NUMERIC_POS => false,
        NUMERIC_NEG => true,
        NUMERIC_NAN => return Ok(String::from("NaN")),
        NUMERIC_PINF => return Ok(String::from("Infinity")),
        NUMERIC_NINF => return Ok(String::from("-Infinity")),
        other => return Err(format!("invalid NUMERIC sign 0x{other:04x}").into()),
    };
    // Digit with base-10000 exponent `exp`; digits past either end are 0.
    let digit = |exp: i32| {
        usize::try_from(weight - exp)
            .ok()
            .and_then(|i| digits.get(i))
            .copied()
            .unwrap_or(0)
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(weight).to_string());
        for exp in (0..weight).rev() {
            out.push_str(&format!("{:04}", digit(exp)));
        }
    }
    if scale > 0 {
        let mut fraction = String::with_capacity(scale + 4);
        let mut exp = -1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", digit(exp)));
            exp -= 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, scale: u16, digits: &[u16]) -> Vec<u8> {
        let count = u16::try_from(digits.len()).unwrap();
        [count, u16::from_be_bytes(weight.to_be_bytes()), sign, scale]
            .iter()
            .chain(digits)
            .flat_map(|w| w.to_be_bytes())
            .collect()
    }

    #[test]
    fn test_numeric_to_string() {
        let cases = [
            (numeric(0, NUMERIC_POS, 1, &[1, 5000]), "1.5"),
            (numeric(1, NUMERIC_POS, 3, &[1, 2345, 6780]), "12345.678"),
            (numeric(-1, NUMERIC_POS, 2, &[500]), "0.05"),
            (numeric(0, NUMERIC_NEG, 0, &[20]), "-20"),
            (numeric(1, NUMERIC_POS, 0, &[1]), "10000"),
            (numeric(0, NUMERIC_POS, 2, &[]), "0.00"),
            (numeric(2, NUMERIC_POS, 0, &[9, 2233, 7203]), "922337203"),
            (numeric(0, NUMERIC_NAN, 0, &[]), "NaN"),
        ];
        for (raw, expected) in cases {
            assert_eq!(numeric_to_string(&raw).unwrap(), expected);
        }
    }

    #[test]
    fn test_numeric_rejects_malformed_input() {
        assert!(numeric_to_string(&[0, 1]).is_err());
        assert!(numeric_to_string(&numeric(0, 0x1234, 0, &[1])).is_err());
        let mut truncated = numeric(0, NUMERIC_POS, 0, &[1, 2]);
        truncated.truncate(10);
        assert!(numeric_to_string(&truncated).is_err());
    }
}
