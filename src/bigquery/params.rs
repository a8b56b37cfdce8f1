//! Named query parameter construction.
//!
//! BigQuery requires an explicit type for every bound parameter. The MCP
//! tool accepts plain JSON, so the type is inferred from each value:
//! booleans become BOOL, integers INT64, other numbers FLOAT64, strings
//! STRING, homogeneous arrays ARRAY<T> and objects STRUCT.

use crate::error::{BqError, BqResult};
use crate::models::{QueryParameter, QueryParameterType, QueryParameterValue, StructFieldType};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Build named query parameters from a JSON mapping.
pub fn named_parameters(params: &Map<String, JsonValue>) -> BqResult<Vec<QueryParameter>> {
    params
        .iter()
        .map(|(name, value)| {
            let (parameter_type, parameter_value) = typed_value(name, value)?;
            Ok(QueryParameter {
                name: Some(name.clone()),
                parameter_type,
                parameter_value,
            })
        })
        .collect()
}

fn typed_value(
    path: &str,
    value: &JsonValue,
) -> BqResult<(QueryParameterType, QueryParameterValue)> {
    Ok((infer_type(path, value)?, encode_value(value)))
}

/// Infer the BigQuery type of a JSON value.
pub fn infer_type(path: &str, value: &JsonValue) -> BqResult<QueryParameterType> {
    match value {
        JsonValue::Null => Err(BqError::invalid_input(format!(
            "Parameter '{}' is null; its type cannot be inferred",
            path
        ))),
        JsonValue::Bool(_) => Ok(QueryParameterType::scalar("BOOL")),
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(QueryParameterType::scalar("INT64")),
        JsonValue::Number(_) => Ok(QueryParameterType::scalar("FLOAT64")),
        JsonValue::String(_) => Ok(QueryParameterType::scalar("STRING")),
        JsonValue::Array(items) => {
            let Some(first) = items.first() else {
                return Err(BqError::invalid_input(format!(
                    "Parameter '{}' is an empty array; its element type cannot be inferred",
                    path
                )));
            };
            let element = infer_type(&format!("{}[0]", path), first)?;
            for (i, item) in items.iter().enumerate().skip(1) {
                let item_type = infer_type(&format!("{}[{}]", path, i), item)?;
                if item_type != element {
                    return Err(BqError::invalid_input(format!(
                        "Parameter '{}' mixes element types ({} and {})",
                        path, element.type_name, item_type.type_name
                    )));
                }
            }
            Ok(QueryParameterType {
                type_name: "ARRAY".to_string(),
                array_type: Some(Box::new(element)),
                struct_types: None,
            })
        }
        JsonValue::Object(fields) => {
            let struct_types = fields
                .iter()
                .map(|(name, field)| {
                    Ok(StructFieldType {
                        name: name.clone(),
                        field_type: infer_type(&format!("{}.{}", path, name), field)?,
                    })
                })
                .collect::<BqResult<Vec<_>>>()?;
            Ok(QueryParameterType {
                type_name: "STRUCT".to_string(),
                array_type: None,
                struct_types: Some(struct_types),
            })
        }
    }
}

fn encode_value(value: &JsonValue) -> QueryParameterValue {
    match value {
        JsonValue::Null => QueryParameterValue::default(),
        JsonValue::Bool(b) => scalar(b.to_string()),
        JsonValue::Number(n) => scalar(n.to_string()),
        JsonValue::String(s) => scalar(s.clone()),
        JsonValue::Array(items) => QueryParameterValue {
            array_values: Some(items.iter().map(encode_value).collect()),
            ..Default::default()
        },
        JsonValue::Object(fields) => QueryParameterValue {
            struct_values: Some(
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), encode_value(field)))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        },
    }
}

fn scalar(value: String) -> QueryParameterValue {
    QueryParameterValue {
        value: Some(value),
        ..Default::default()
    }
}
