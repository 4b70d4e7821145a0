//! Value conversions shared by filters and decoders.
//!
//! Timestamps travel as fixed-format RFC 3339 UTC text so that stored values
//! compare chronologically as plain strings.

use super::{MapError, MapResult};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};

/// Renders a timestamp in the single textual format used for storage.
pub fn timestamp_to_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn timestamp_value(value: &DateTime<Utc>) -> Value {
    Value::Text(timestamp_to_text(value))
}

/// Nullable timestamp argument; `None` binds SQL `NULL`.
pub fn optional_timestamp_value(value: Option<&DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, timestamp_value)
}

/// Parses stored timestamp text.
///
/// # Errors
/// - [`MapError::Decode`] when the text is not RFC 3339.
pub fn parse_timestamp(text: &str, field: &str) -> MapResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| MapError::Decode(format!("invalid timestamp `{text}` in {field}: {err}")))
}

pub fn parse_optional_timestamp(
    text: Option<&str>,
    field: &str,
) -> MapResult<Option<DateTime<Utc>>> {
    text.map(|value| parse_timestamp(value, field)).transpose()
}

/// Reads an integer identifier from a JSON record.
///
/// Aggregated numbers may arrive as floating point; whole values in range
/// are accepted, anything else is a decode failure.
pub fn json_integer(record: &Map<String, JsonValue>, key: &str) -> MapResult<i64> {
    let value = record
        .get(key)
        .ok_or_else(|| MapError::Decode(format!("missing `{key}` in aggregate record")))?;
    let JsonValue::Number(number) = value else {
        return Err(MapError::Decode(format!(
            "expected number for `{key}`, got `{value}`"
        )));
    };

    if let Some(integer) = number.as_i64() {
        return Ok(integer);
    }

    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64 => {
            Ok(float as i64)
        }
        _ => Err(MapError::Decode(format!(
            "value `{number}` for `{key}` is not an integer identifier"
        ))),
    }
}

pub fn json_string(record: &Map<String, JsonValue>, key: &str) -> MapResult<String> {
    match record.get(key) {
        Some(JsonValue::String(text)) => Ok(text.clone()),
        Some(other) => Err(MapError::Decode(format!(
            "expected string for `{key}`, got `{other}`"
        ))),
        None => Err(MapError::Decode(format!(
            "missing `{key}` in aggregate record"
        ))),
    }
}

/// Absent and JSON `null` both read as `None`.
pub fn json_optional_string(record: &Map<String, JsonValue>, key: &str) -> MapResult<Option<String>> {
    match record.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(MapError::Decode(format!(
            "expected string or null for `{key}`, got `{other}`"
        ))),
    }
}
