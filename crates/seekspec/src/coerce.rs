//! Conversion of loosely-typed request values into field-typed clause values.
//!
//! Filter documents and cursor payloads arrive as JSON. Each value is
//! converted against the [`FieldDef`] it is compared with:
//!
//! - values that already have the right JSON type pass through,
//! - `null` is accepted for nullable fields (and means the nil UUID for
//!   non-nullable UUID fields),
//! - UUIDs, enums and timestamps get dedicated parsers,
//! - anything else falls back to a plain scalar conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::clause::ClauseValue;
use crate::error::{Result, SeekError};
use crate::schema::{FieldDef, FieldKind};
use crate::value::{Number, Timestamp};

/// Integers with a smaller magnitude are epoch seconds, larger ones epoch
/// milliseconds.
pub const EPOCH_SECONDS_LIMIT: i64 = 100_000_000_000;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Converts `value` to the type declared by `field`.
pub fn coerce(value: &JsonValue, field: &FieldDef) -> Result<ClauseValue> {
    let fail = || SeekError::Coercion {
        from: json_type(value),
        to: field.kind.as_str(),
    };

    if value.is_null() {
        return match field.kind {
            FieldKind::Uuid if !field.nullable => Ok(ClauseValue::Uuid(Uuid::nil())),
            _ if field.nullable => Ok(ClauseValue::Null),
            _ => Err(fail()),
        };
    }

    match field.kind {
        FieldKind::String => match value {
            JsonValue::String(s) => Ok(ClauseValue::String(s.clone())),
            JsonValue::Number(n) => Ok(ClauseValue::String(n.to_string())),
            JsonValue::Bool(b) => Ok(ClauseValue::String(b.to_string())),
            _ => Err(fail()),
        },
        FieldKind::Number => match value {
            JsonValue::Number(n) => Number::from_json(n).map(ClauseValue::Number).ok_or_else(fail),
            JsonValue::String(s) => parse_number(s).map(ClauseValue::Number).ok_or_else(fail),
            _ => Err(fail()),
        },
        FieldKind::Timestamp => match value {
            JsonValue::String(s) => parse_timestamp(s).map(ClauseValue::Timestamp).ok_or_else(fail),
            JsonValue::Number(n) => n
                .as_i64()
                .map(epoch_to_timestamp)
                .map(ClauseValue::Timestamp)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        FieldKind::Uuid => match value {
            JsonValue::String(s) if s.trim().is_empty() => Ok(ClauseValue::Uuid(Uuid::nil())),
            JsonValue::String(s) => Uuid::parse_str(s.trim())
                .map(ClauseValue::Uuid)
                .map_err(|_| fail()),
            _ => Err(fail()),
        },
        FieldKind::Enum(variants) => {
            let ordinal = match value {
                JsonValue::String(s) => variant_index(variants, s)
                    .or_else(|| s.trim().parse::<u32>().ok()),
                JsonValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                _ => None,
            };
            match ordinal {
                Some(d) if variants.is_empty() || (d as usize) < variants.len() => {
                    Ok(ClauseValue::Enum(d))
                }
                _ => Err(fail()),
            }
        }
        FieldKind::Bool => match value {
            JsonValue::Bool(b) => Ok(ClauseValue::Bool(*b)),
            JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(ClauseValue::Bool(true)),
                "false" | "0" => Ok(ClauseValue::Bool(false)),
                _ => Err(fail()),
            },
            JsonValue::Number(n) => match n.as_u64() {
                Some(1) => Ok(ClauseValue::Bool(true)),
                Some(0) => Ok(ClauseValue::Bool(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
        FieldKind::Object => Err(fail()),
    }
}

/// Coerces every element of an `$in`-style array.
pub fn coerce_all(values: &[JsonValue], field: &FieldDef) -> Result<Vec<ClauseValue>> {
    values.iter().map(|v| coerce(v, field)).collect()
}

/// Parses RFC 3339, naive date-times (as UTC), plain dates (midnight UTC) or
/// integer epoch values.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Timestamp(dt.timestamp_millis()));
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Timestamp(dt.and_utc().timestamp_millis()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        return Some(Timestamp(midnight.and_utc().timestamp_millis()));
    }
    s.parse::<i64>().ok().map(epoch_to_timestamp)
}

pub fn epoch_to_timestamp(n: i64) -> Timestamp {
    if n.unsigned_abs() < EPOCH_SECONDS_LIMIT as u64 {
        Timestamp::from_secs(n)
    } else {
        Timestamp::from_millis(n)
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::I64(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::U64(u));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Number::F64)
}

fn variant_index(variants: &[&str], name: &str) -> Option<u32> {
    let name = name.trim();
    variants
        .iter()
        .position(|v| v.eq_ignore_ascii_case(name))
        .and_then(|i| u32::try_from(i).ok())
}

pub(crate) fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
