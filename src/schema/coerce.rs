//! Per-type coercion table
//!
//! Each column type owns one coercion function turning a JSON input into a
//! `FieldValue`. Payload fields, column defaults and query-string literals
//! all go through the same table.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use super::types::{ColumnDef, ColumnType};
use crate::error::{EngineError, EngineResult};
use crate::value::FieldValue;

type Coercer = fn(&Value) -> Result<FieldValue, String>;

fn coercer(column_type: ColumnType) -> Coercer {
    match column_type {
        ColumnType::String => coerce_string,
        ColumnType::Integer => coerce_integer,
        ColumnType::Decimal => coerce_decimal,
        ColumnType::Boolean => coerce_boolean,
        ColumnType::Timestamp => coerce_timestamp,
        ColumnType::Json => coerce_json,
    }
}

/// Coerce a present, non-null value against a column's type
pub fn coerce(value: &Value, column: &ColumnDef) -> EngineResult<FieldValue> {
    if value.is_null() {
        return null_for(column);
    }
    coercer(column.column_type)(value)
        .map_err(|reason| EngineError::validation(&column.name, reason))
}

/// Coerce a payload field that may be absent or null.
///
/// Absent fields take the column default, then null when nullable.
pub fn coerce_field(value: Option<&Value>, column: &ColumnDef) -> EngineResult<FieldValue> {
    match value {
        Some(v) => coerce(v, column),
        None => match &column.default {
            Some(default) => coerce(default, column),
            None if column.nullable => Ok(FieldValue::Null),
            None => Err(EngineError::validation(
                &column.name,
                "required field is missing",
            )),
        },
    }
}

/// Coerce a query-string literal against a column's type
pub fn coerce_literal(raw: &str, column: &ColumnDef) -> EngineResult<FieldValue> {
    match column.column_type {
        ColumnType::String => Ok(FieldValue::String(raw.to_string())),
        ColumnType::Json => Ok(FieldValue::Json(
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        )),
        _ => coerce(&Value::String(raw.trim().to_string()), column),
    }
}

fn null_for(column: &ColumnDef) -> EngineResult<FieldValue> {
    if column.nullable {
        Ok(FieldValue::Null)
    } else {
        Err(EngineError::validation(
            &column.name,
            "cannot be null (nullable=false)",
        ))
    }
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {}, got {}", expected, json_type_name(value))
}

fn coerce_string(value: &Value) -> Result<FieldValue, String> {
    match value {
        Value::String(s) => Ok(FieldValue::String(s.clone())),
        other => Err(mismatch("string", other)),
    }
}

fn coerce_integer(value: &Value) -> Result<FieldValue, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(FieldValue::Integer(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(FieldValue::Integer(f as i64))
                }
                _ => Err(format!("expected integer, got {}", n)),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| format!("expected integer, got '{}'", s)),
        other => Err(mismatch("integer", other)),
    }
}

fn coerce_decimal(value: &Value) -> Result<FieldValue, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => return Err(mismatch("decimal", other)),
    };
    let d = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("expected decimal, got '{}'", text))?;
    if Some(d.scale()) != written_scale(&text) {
        return Err(format!("decimal '{}' cannot be stored exactly", text));
    }
    Ok(FieldValue::Decimal(d))
}

/// Fractional digits the input spells out, after applying any exponent.
/// The parser silently rounds past its precision; a scale mismatch shows it.
fn written_scale(text: &str) -> Option<u32> {
    let (mantissa, exponent) = match text.find(|c| c == 'e' || c == 'E') {
        Some(at) => (&text[..at], text[at + 1..].parse::<i64>().ok()?),
        None => (text, 0),
    };
    let fraction = mantissa.split_once('.').map_or(0, |(_, f)| f.len()) as i64;
    u32::try_from((fraction - exponent).max(0)).ok()
}

fn coerce_boolean(value: &Value) -> Result<FieldValue, String> {
    match value {
        Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(FieldValue::Boolean(true)),
            "false" | "0" => Ok(FieldValue::Boolean(false)),
            _ => Err(format!("expected boolean, got '{}'", s)),
        },
        other => Err(mismatch("boolean", other)),
    }
}

fn coerce_timestamp(value: &Value) -> Result<FieldValue, String> {
    let s = match value {
        Value::String(s) => s.trim(),
        other => return Err(mismatch("timestamp", other)),
    };
    parse_timestamp(s)
        .map(FieldValue::Timestamp)
        .ok_or_else(|| format!("expected RFC 3339 timestamp, got '{}'", s))
}

fn coerce_json(value: &Value) -> Result<FieldValue, String> {
    Ok(FieldValue::Json(value.clone()))
}

/// RFC 3339, naive ISO-8601 date-time (UTC assumed) or a bare date
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
