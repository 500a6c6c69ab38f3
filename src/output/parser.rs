//! Structured parsing of model output.

use serde_json::Value;

use crate::declaration::Schema;
use crate::error::ParseError;

/// Converts raw model text into a JSON value conforming to a schema.
pub trait StructuredParser: Send + Sync {
    fn parse(&self, text: &str, schema: &Schema) -> Result<Value, ParseError>;
}

/// Parses the text as one JSON document.
///
/// A single enclosing markdown code fence (`` ```json … ``` ``) is removed
/// before parsing. The top-level `type` and `required` keywords of the
/// schema are checked; nested structure is left to typed decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStructuredParser;

impl StructuredParser for JsonStructuredParser {
    fn parse(&self, text: &str, schema: &Schema) -> Result<Value, ParseError> {
        let body = strip_code_fence(text.trim());
        let value: Value = serde_json::from_str(body).map_err(|e| ParseError::new(e.to_string()))?;
        check_top_level(&value, &schema.definition)?;
        Ok(value)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };
    match inner.split_once('\n') {
        Some((tag, rest)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest.trim(),
        _ => inner.trim(),
    }
}

fn check_top_level(value: &Value, definition: &Value) -> Result<(), ParseError> {
    if let Some(expected) = definition.get("type").and_then(Value::as_str) {
        if !matches_type(value, expected) {
            return Err(ParseError::new(format!(
                "expected a JSON {expected}, got {}",
                type_name(value)
            )));
        }
    }

    if let (Some(required), Some(object)) = (
        definition.get("required").and_then(Value::as_array),
        value.as_object(),
    ) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(ParseError::new(format!("missing required field '{key}'")));
            }
        }
    }

    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
