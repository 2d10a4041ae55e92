//! Argument validation against a tool's input schema.
//!
//! Covers the object subset of JSON Schema that tool descriptors use:
//! `required`, per-property `type`, and `additionalProperties: false`.
//! Validation runs before the handler, so a rejected call has no side
//! effects.

use serde_json::{Map, Value};

/// Validate `arguments` against `schema`.
///
/// Returns the offending field names on failure, in schema order for
/// missing fields followed by argument order for unknown/mistyped ones.
pub fn validate(schema: &Value, arguments: &Map<String, Value>) -> Result<(), Vec<String>> {
    let mut offending = Vec::new();

    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(field) {
                offending.push(format!("{field} (missing)"));
            }
        }
    }

    let additional_allowed = schema
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    for (name, value) in arguments {
        match properties.and_then(|p| p.get(name)) {
            Some(property) => {
                if let Some(expected) = property.get("type").and_then(Value::as_str)
                    && !type_matches(expected, value)
                {
                    offending.push(format!("{name} (expected {expected})"));
                }
            }
            None if !additional_allowed => {
                offending.push(format!("{name} (unknown)"));
            }
            None => {}
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(offending)
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keyword: do not reject what we cannot check.
        _ => true,
    }
}
