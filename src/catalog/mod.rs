//! Tool catalog: static capability and tool metadata.
//!
//! Built once at startup from a [`CatalogDocument`] and read-only afterwards.
//! Owns tool *metadata* (not implementations); the registry owns handlers.
//! Listing order is always catalog declaration order, since clients read it
//! as a hint of precedence.

mod source;

pub use source::{CapabilitySpec, CatalogDocument, ToolSpec};

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::HandlerFactories;
use crate::types::{CapabilityId, Error, Result};

/// Summary used for tools declared without one.
pub const DEFAULT_SUMMARY: &str = "No description available";

// =============================================================================
// Descriptors
// =============================================================================

/// Static description of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub capability_id: CapabilityId,
    pub summary: String,
    pub lazy: bool,
}

/// Static description of one capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityMetadata {
    pub id: CapabilityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub tools: Vec<String>,
    pub lazy: bool,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Adapter settings. Never serialized: may hold credentials.
    #[serde(skip_serializing, default)]
    pub options: Map<String, Value>,
}

impl CapabilityMetadata {
    pub fn new(id: CapabilityId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            description: String::new(),
            tools: Vec::new(),
            lazy: true,
            timeout: None,
            options: Map::new(),
        }
    }

    /// String option set in the catalog for this capability.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    capabilities: Vec<CapabilityMetadata>,
    tools: Vec<ToolDescriptor>,
    tool_index: HashMap<String, usize>,
    capability_index: HashMap<CapabilityId, usize>,
    disabled: Vec<String>,
}

impl ToolCatalog {
    /// Build and validate the catalog from a parsed document.
    ///
    /// Fails with [`Error::Config`] when a capability is missing `type` or
    /// `tools`, when a tool name is declared twice, or when a capability type
    /// has no registered handler factory. Capabilities with `enabled: false`
    /// are left out entirely.
    pub fn load(document: &CatalogDocument, factories: &HandlerFactories) -> Result<Self> {
        let mut catalog = Self::default();

        for (raw_id, spec) in &document.capabilities {
            if !spec.enabled {
                tracing::debug!(capability = %raw_id, "skipping disabled capability");
                catalog.disabled.push(raw_id.clone());
                continue;
            }

            let id = CapabilityId::from_string(raw_id.clone())
                .map_err(|e| Error::config(e.to_string()))?;
            let kind = spec.kind.clone().ok_or_else(|| {
                Error::config(format!("capability '{}' is missing required field 'type'", id))
            })?;
            let tool_specs = spec.tools.as_ref().ok_or_else(|| {
                Error::config(format!("capability '{}' is missing required field 'tools'", id))
            })?;
            if !factories.contains(&kind) {
                return Err(Error::config(format!(
                    "capability '{}' has type '{}' with no registered handler factory (known: {})",
                    id,
                    kind,
                    factories.kinds().join(", ")
                )));
            }
            if tool_specs.is_empty() {
                tracing::warn!(capability = %id, "capability declares no tools");
            }

            let mut tool_names = Vec::with_capacity(tool_specs.len());
            for tool in tool_specs {
                let name = tool.name().trim();
                if name.is_empty() {
                    return Err(Error::config(format!(
                        "capability '{}' declares a tool with an empty name",
                        id
                    )));
                }
                if let Some(&existing) = catalog.tool_index.get(name) {
                    return Err(Error::config(format!(
                        "tool '{}' declared by both '{}' and '{}'",
                        name, catalog.tools[existing].capability_id, id
                    )));
                }
                catalog.tool_index.insert(name.to_string(), catalog.tools.len());
                catalog.tools.push(ToolDescriptor {
                    name: name.to_string(),
                    capability_id: id.clone(),
                    summary: tool.summary().unwrap_or(DEFAULT_SUMMARY).to_string(),
                    lazy: spec.lazy_load,
                });
                tool_names.push(name.to_string());
            }

            catalog
                .capability_index
                .insert(id.clone(), catalog.capabilities.len());
            catalog.capabilities.push(CapabilityMetadata {
                id,
                kind,
                description: spec.description.clone(),
                tools: tool_names,
                lazy: spec.lazy_load,
                timeout: spec.timeout,
                options: spec.options.clone(),
            });
        }

        tracing::info!(
            capabilities = catalog.capabilities.len(),
            tools = catalog.tools.len(),
            disabled = catalog.disabled.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Tools in declaration order, optionally restricted to one capability.
    pub fn list_tools(&self, capability_filter: Option<&str>) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .filter(|tool| capability_filter.map_or(true, |cap| tool.capability_id == cap))
            .collect()
    }

    /// Get a tool descriptor by name.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tool_index.contains_key(name)
    }

    /// Capability owning `tool_name`.
    pub fn capability_for_tool(&self, tool_name: &str) -> Result<&CapabilityId> {
        self.tool(tool_name)
            .map(|tool| &tool.capability_id)
            .ok_or_else(|| Error::unknown_tool(tool_name))
    }

    /// Metadata of one capability.
    pub fn describe_capability(&self, id: &str) -> Result<&CapabilityMetadata> {
        self.capability_index
            .get(id)
            .map(|&i| &self.capabilities[i])
            .ok_or_else(|| Error::not_found(format!("capability '{}'", id)))
    }

    /// All enabled capabilities in declaration order.
    pub fn capabilities(&self) -> &[CapabilityMetadata] {
        &self.capabilities
    }

    /// Ids declared in the document with `enabled: false`.
    pub fn disabled_capabilities(&self) -> &[String] {
        &self.disabled
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
