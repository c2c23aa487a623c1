//! Declarative catalog document.
//!
//! The catalog is a YAML document mapping capability id to its declaration,
//! alongside the broker configuration sections:
//!
//! ```yaml
//! capabilities:
//!   code_understanding:
//!     enabled: true
//!     type: subprocess
//!     lazy_load: true
//!     description: Semantic code search
//!     timeout: 45s
//!     tools:
//!       - name: search_code
//!         summary: Search codebase semantically
//!       - find_symbol
//!     command: codanna
//! registry:
//!   schema_ttl: 1h
//! ```
//!
//! Keys a capability does not recognise are kept as handler options.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BrokerConfig, Error, Result};

/// Whole catalog document: capabilities in declaration order plus config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub capabilities: IndexMap<String, CapabilitySpec>,

    #[serde(flatten)]
    pub config: BrokerConfig,
}

impl CatalogDocument {
    /// Parse a YAML catalog document.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| Error::config(format!("invalid catalog: {}", e)))
    }

    /// Read and parse a YAML catalog file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&source)
    }
}

/// One capability declaration.
///
/// `type` and `tools` are required; they are optional here so that a missing
/// field is reported with the capability's id instead of a serde position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub tools: Option<Vec<ToolSpec>>,

    #[serde(default = "default_lazy_load")]
    pub lazy_load: bool,

    #[serde(default)]
    pub description: String,

    /// Per-capability execute timeout, overriding the registry default.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Adapter-specific settings (`command`, `api_url`, `schemas`, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_lazy_load() -> bool {
    true
}

/// A tool entry: either a bare name or a name with a one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolSpec {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        summary: Option<String>,
    },
}

impl ToolSpec {
    pub fn name(&self) -> &str {
        match self {
            ToolSpec::Name(name) => name,
            ToolSpec::Detailed { name, .. } => name,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        match self {
            ToolSpec::Name(_) => None,
            ToolSpec::Detailed { summary, .. } => summary.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
capabilities:
  zeta:
    enabled: true
    type: subprocess
    command: codanna
    tools:
      - search_code
      - name: find_symbol
        summary: Find symbol definition
  alpha:
    enabled: false
    type: http
    api_url: http://localhost:9000
    tools: [resolve_library_id]
discovery:
  mode: progressive
  search_only_tokens: 50
registry:
  execute_timeout: 10s
"#;

    #[test]
    fn test_declaration_order_preserved() {
        let doc = CatalogDocument::from_yaml_str(SAMPLE).unwrap();
        let ids: Vec<&str> = doc.capabilities.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_tool_specs_and_options() {
        let doc = CatalogDocument::from_yaml_str(SAMPLE).unwrap();
        let zeta = &doc.capabilities["zeta"];
        assert_eq!(zeta.kind.as_deref(), Some("subprocess"));
        assert!(zeta.lazy_load);
        assert_eq!(zeta.options.get("command"), Some(&Value::from("codanna")));

        let tools = zeta.tools.as_ref().unwrap();
        assert_eq!(tools[0], ToolSpec::Name("search_code".to_string()));
        assert_eq!(tools[1].name(), "find_symbol");
        assert_eq!(tools[1].summary(), Some("Find symbol definition"));
    }

    #[test]
    fn test_config_sections_flattened() {
        let doc = CatalogDocument::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(doc.config.registry.execute_timeout, Duration::from_secs(10));
        assert_eq!(doc.config.discovery.mode, "progressive");
        assert_eq!(doc.config.discovery.search_only_tokens, 50);
        assert_eq!(doc.config.discovery.describe_only_tokens, 200);
    }

    #[test]
    fn test_enabled_defaults_to_false() {
        let doc = CatalogDocument::from_yaml_str(
            "capabilities:\n  cap:\n    type: http\n    tools: [a]\n",
        )
        .unwrap();
        assert!(!doc.capabilities["cap"].enabled);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = CatalogDocument::from_yaml_str("capabilities: [unclosed").unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = CatalogDocument::from_path(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }
}
