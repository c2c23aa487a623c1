//! Generic capability adapters.
//!
//! - `subprocess`: one process per execute, JSON over stdin/stdout.
//! - `http`: one POST per execute against a capability service.
//!
//! Both read their tool schemas from the capability's `schemas` option:
//!
//! ```yaml
//! schemas:
//!   search_code:
//!     description: Search codebase semantically
//!     input_schema:
//!       type: object
//!       properties: {query: {type: string}}
//!       required: [query]
//! ```

pub mod http;
pub mod subprocess;

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::CapabilityMetadata;
use crate::registry::{HandlerError, HandlerResult, ToolSchema};

#[derive(Debug, Deserialize)]
struct InlineSchema {
    #[serde(default)]
    description: String,
    #[serde(default = "empty_object_schema")]
    input_schema: Value,
    #[serde(default)]
    output_schema: Option<Value>,
    #[serde(default)]
    examples: Option<Vec<Value>>,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Tool schemas declared inline in the catalog.
#[derive(Debug, Clone, Default)]
pub(crate) struct InlineSchemas {
    schemas: HashMap<String, ToolSchema>,
}

impl InlineSchemas {
    pub(crate) fn from_metadata(meta: &CapabilityMetadata) -> HandlerResult<Self> {
        let Some(raw) = meta.options.get("schemas") else {
            return Ok(Self::default());
        };
        let parsed: HashMap<String, InlineSchema> = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerError::config(format!("capability '{}': invalid schemas: {}", meta.id, e)))?;

        let schemas = parsed
            .into_iter()
            .map(|(name, inline)| {
                let schema = ToolSchema {
                    name: name.clone(),
                    description: inline.description,
                    input_schema: inline.input_schema,
                    output_schema: inline.output_schema,
                    examples: inline.examples,
                };
                (name, schema)
            })
            .collect();
        Ok(Self { schemas })
    }

    pub(crate) fn get(&self, tool_name: &str) -> HandlerResult<ToolSchema> {
        self.schemas
            .get(tool_name)
            .cloned()
            .ok_or_else(|| HandlerError::UnknownTool(tool_name.to_string()))
    }
}

/// Required string option.
pub(crate) fn required_option<'a>(meta: &'a CapabilityMetadata, key: &str) -> HandlerResult<&'a str> {
    meta.option_str(key).ok_or_else(|| {
        HandlerError::config(format!(
            "capability '{}' of type '{}' requires option '{}'",
            meta.id, meta.kind, key
        ))
    })
}

/// Body sent to a capability for one execution.
pub(crate) fn call_payload(tool_name: &str, arguments: Value) -> Value {
    json!({"tool": tool_name, "arguments": arguments})
}
