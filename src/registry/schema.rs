//! Tool schemas and the time-bounded schema cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::types::{Error, Result};

/// Full description of a tool's input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema: None,
            examples: None,
        }
    }

    /// Names of the top-level input properties, in schema order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Fields listed under the input schema's `required` array.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|req| req.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// One-line rendering: `name(param1, param2) - description`.
    pub fn signature(&self) -> String {
        let params = self.parameter_names();
        let params = if params.is_empty() {
            "no parameters".to_string()
        } else {
            params.join(", ")
        };
        format!("{}({}) - {}", self.name, params, self.description)
    }
}

/// A schema plus its compiled argument validator.
#[derive(Clone)]
pub struct CachedSchema {
    pub schema: Arc<ToolSchema>,
    pub validator: Arc<Validator>,
}

impl std::fmt::Debug for CachedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSchema")
            .field("schema", &self.schema.name)
            .finish()
    }
}

impl CachedSchema {
    /// Compile the schema's `input_schema` into a validator.
    pub fn compile(schema: ToolSchema) -> Result<Self> {
        let validator = jsonschema::validator_for(&schema.input_schema).map_err(|e| {
            Error::internal(format!(
                "tool '{}' declares an invalid input schema: {}",
                schema.name, e
            ))
        })?;
        Ok(Self {
            schema: Arc::new(schema),
            validator: Arc::new(validator),
        })
    }
}

#[derive(Debug)]
struct SchemaCacheEntry {
    cached: CachedSchema,
    inserted_at: Instant,
}

impl SchemaCacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// Schema cache keyed by tool name. Entries at or past the TTL are treated
/// as absent.
#[derive(Debug)]
pub struct SchemaCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, SchemaCacheEntry>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached schema for `tool_name` if present and younger than the TTL.
    pub async fn get_fresh(&self, tool_name: &str) -> Option<CachedSchema> {
        let entries = self.entries.read().await;
        entries
            .get(tool_name)
            .filter(|entry| !entry.is_expired(Instant::now(), self.ttl))
            .map(|entry| entry.cached.clone())
    }

    /// Store a schema under its tool name with a fresh timestamp.
    pub async fn insert(&self, tool_name: &str, cached: CachedSchema) {
        let mut entries = self.entries.write().await;
        entries.insert(
            tool_name.to_string(),
            SchemaCacheEntry {
                cached,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one entry. Returns true if it existed.
    pub async fn invalidate(&self, tool_name: &str) -> bool {
        self.entries.write().await.remove(tool_name).is_some()
    }

    /// Drop the entries for several tools. Returns how many existed.
    pub async fn invalidate_many<S: AsRef<str>>(&self, tool_names: &[S]) -> usize {
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for name in tool_names {
            let name: &str = name.as_ref();
            if entries.remove(name).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drop every entry. Returns how many existed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
