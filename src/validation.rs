//! Request validation utilities.

use jsonschema::Validator;
use serde_json::Value;

use crate::types::{Error, Result};

/// Validate that a string is not empty.
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate tool arguments against the tool's compiled input schema.
///
/// Arguments must be a JSON object. Every schema violation is reported in a
/// single message, each prefixed with the JSON pointer it applies to.
pub fn validate_arguments(tool: &str, validator: &Validator, arguments: &Value) -> Result<()> {
    if !arguments.is_object() {
        return Err(Error::validation(format!(
            "arguments for '{}' must be an object, got {}",
            tool,
            value_type_name(arguments)
        )));
    }

    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{}: {}", path, err)
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid arguments for '{}': {}",
            tool,
            errors.join("; ")
        )))
    }
}

pub(crate) fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
