//! MySQL row -> JSON conversion for pass-through policy records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::PolicyRecord;

/// Convert every column of `row` into a JSON value, keeping column order.
pub fn row_to_record(row: &MySqlRow) -> PolicyRecord {
    let mut record = Map::with_capacity(row.len());

    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name());
        record.insert(column.name().to_string(), value);
    }

    record
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    typed_value(row, index, type_name).unwrap_or_else(|| {
        tracing::debug!(column = index, type_name, "falling back to untyped decode");
        untyped_value(row, index)
    })
}

fn typed_value(row: &MySqlRow, index: usize, type_name: &str) -> Option<Value> {
    match type_name {
        "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        name if name.ends_with("UNSIGNED") => {
            row.try_get::<u64, _>(index).ok().map(Value::from)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(index).ok().map(Value::from)
        }
        "FLOAT" => row
            .try_get::<f32, _>(index)
            .ok()
            .map(|v| float_value(f64::from(v))),
        "DOUBLE" => row.try_get::<f64, _>(index).ok().map(float_value),
        // Exact decimals go out as strings
        "DECIMAL" => row
            .try_get::<Decimal, _>(index)
            .ok()
            .map(|d| Value::String(d.to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(index)
            .ok()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(index)
            .ok()
            .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(index)
            .ok()
            .map(|ts| Value::String(ts.to_rfc3339())),
        "TIME" => row
            .try_get::<NaiveTime, _>(index)
            .ok()
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        "JSON" => row.try_get::<Value, _>(index).ok(),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            row.try_get::<String, _>(index).ok().map(Value::String)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .ok()
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        _ => None,
    }
}

fn untyped_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(s) = row.try_get::<String, _>(index) {
        Value::String(s)
    } else if let Ok(i) = row.try_get::<i64, _>(index) {
        Value::from(i)
    } else if let Ok(u) = row.try_get::<u64, _>(index) {
        Value::from(u)
    } else if let Ok(f) = row.try_get::<f64, _>(index) {
        float_value(f)
    } else if let Ok(b) = row.try_get::<bool, _>(index) {
        Value::Bool(b)
    } else if let Ok(bytes) = row.try_get_unchecked::<Vec<u8>, _>(index) {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Value::Null
    }
}

/// Non-finite floats have no JSON form and become `null`.
fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
