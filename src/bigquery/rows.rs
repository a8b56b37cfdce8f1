//! Row decoding.
//!
//! BigQuery returns every cell as a string inside `{"f": [{"v": ...}]}`
//! wrappers. This module turns those rows into plain JSON objects keyed by
//! column name, using the result schema to restore types.
//!
//! # Type mapping
//!
//! | BigQuery type        | JSON                                   |
//! |----------------------|----------------------------------------|
//! | INTEGER / INT64      | number (string when outside i64)       |
//! | FLOAT / FLOAT64      | number (string for NaN / Infinity)     |
//! | BOOLEAN / BOOL       | bool                                   |
//! | TIMESTAMP            | ISO-8601 string, microsecond precision |
//! | JSON                 | parsed JSON                            |
//! | RECORD / STRUCT      | object                                 |
//! | REPEATED mode        | array                                  |
//! | everything else      | string, as returned                    |

use crate::models::{TableFieldSchema, TableRow, TableSchema};
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value as JsonValue};

/// Logical category for BigQuery column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Json,
    Record,
    Text,
}

/// Classify a BigQuery type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => TypeCategory::Integer,
        "FLOAT" | "FLOAT64" => TypeCategory::Float,
        "BOOLEAN" | "BOOL" => TypeCategory::Boolean,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "JSON" => TypeCategory::Json,
        "RECORD" | "STRUCT" => TypeCategory::Record,
        _ => TypeCategory::Text,
    }
}

/// Decode all rows of a result page.
///
/// Without a schema (dry runs, DDL) there is nothing to decode against and
/// the result is empty.
pub fn decode_rows(schema: Option<&TableSchema>, rows: &[TableRow]) -> Vec<Map<String, JsonValue>> {
    let Some(schema) = schema else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| decode_record(&schema.fields, row))
        .collect()
}

fn decode_record(fields: &[TableFieldSchema], row: &TableRow) -> Map<String, JsonValue> {
    fields
        .iter()
        .zip(row.f.iter())
        .map(|(field, cell)| (field.name.clone(), decode_field(field, &cell.v)))
        .collect()
}

fn decode_field(field: &TableFieldSchema, value: &JsonValue) -> JsonValue {
    if field.is_repeated() {
        return match value {
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    // each element is wrapped as {"v": ...}
                    .map(|item| decode_value(field, item.get("v").unwrap_or(item)))
                    .collect(),
            ),
            JsonValue::Null => JsonValue::Array(Vec::new()),
            other => decode_value(field, other),
        };
    }
    decode_value(field, value)
}

fn decode_value(field: &TableFieldSchema, value: &JsonValue) -> JsonValue {
    if value.is_null() {
        return JsonValue::Null;
    }

    match categorize_type(&field.field_type) {
        TypeCategory::Record => match serde_json::from_value::<TableRow>(value.clone()) {
            Ok(row) => JsonValue::Object(decode_record(&field.fields, &row)),
            Err(_) => value.clone(),
        },
        category => match value.as_str() {
            Some(raw) => decode_scalar(category, raw),
            None => value.clone(),
        },
    }
}

fn decode_scalar(category: TypeCategory, raw: &str) -> JsonValue {
    match category {
        TypeCategory::Integer => raw
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(raw.to_string())),
        TypeCategory::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(raw.to_string())),
        TypeCategory::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => JsonValue::Bool(true),
            "false" => JsonValue::Bool(false),
            _ => JsonValue::String(raw.to_string()),
        },
        TypeCategory::Timestamp => timestamp_to_iso(raw)
            .map(JsonValue::String)
            .unwrap_or_else(|| JsonValue::String(raw.to_string())),
        TypeCategory::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
        }
        TypeCategory::Record | TypeCategory::Text => JsonValue::String(raw.to_string()),
    }
}

/// Convert a TIMESTAMP cell to ISO-8601.
///
/// Accepts int64 microseconds (`formatOptions.useInt64Timestamp`) and the
/// legacy float-seconds form such as "1.7E9".
pub fn timestamp_to_iso(raw: &str) -> Option<String> {
    let datetime = match raw.parse::<i64>() {
        Ok(micros) => DateTime::from_timestamp_micros(micros)?,
        Err(_) => {
            let seconds = raw.parse::<f64>().ok().filter(|s| s.is_finite())?;
            DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)?
        }
    };
    Some(datetime.to_rfc3339_opts(SecondsFormat::Micros, true))
}
