//! Small helpers for pulling typed values out of a tool's input map.

use serde_json::{Map, Value};

/// A required string input; `Err` carries the message for the error result.
pub(crate) fn req_str<'a>(input: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required input: {key}"))
}

/// An optional string input with a default.
pub(crate) fn opt_str<'a>(input: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// An optional integer input with a default.
pub(crate) fn opt_u64(input: &Map<String, Value>, key: &str, default: u64) -> u64 {
    input.get(key).and_then(Value::as_u64).unwrap_or(default)
}
