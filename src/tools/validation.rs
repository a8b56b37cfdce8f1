//! Parameter validation.
//!
//! Turns untyped parameter bags into typed inputs. Failures come back as
//! `BqError::InvalidInput` values so the caller can answer with a
//! protocol-level error instead of aborting the request.

use crate::error::{BqError, BqResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

/// Untyped parameters as received from the client.
pub type ParamBag = Map<String, JsonValue>;

/// Semantic checks that run after type-level decoding.
pub trait Validate {
    fn validate(&self) -> BqResult<()>;
}

/// Decode a parameter bag into `T` and validate it.
///
/// Missing required fields and wrong-typed optional fields are rejected
/// during decoding; `T::validate` handles the rest.
pub fn parse_params<T>(bag: ParamBag) -> BqResult<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(JsonValue::Object(bag))
        .map_err(|e| BqError::invalid_input(e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

/// Reject empty or whitespace-only values.
pub fn require_non_empty(field: &str, value: &str) -> BqResult<()> {
    if value.trim().is_empty() {
        Err(BqError::invalid_input(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Like `require_non_empty`, for optional values.
pub fn optional_non_empty(field: &str, value: Option<&str>) -> BqResult<()> {
    match value {
        Some(v) => require_non_empty(field, v),
        None => Ok(()),
    }
}
