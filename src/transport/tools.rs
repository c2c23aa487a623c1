//! Meta-tools exposed to protocol clients.
//!
//! The client never sees capability tools directly; it sees these seven
//! tools and reaches everything else through them.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SEARCH_TOOLS: &str = "search_tools";
pub const DESCRIBE_TOOLS: &str = "describe_tools";
pub const EXECUTE_TOOL: &str = "execute_tool";
pub const LIST_CAPABILITIES: &str = "list_capabilities";
pub const ENABLE_CAPABILITY: &str = "enable_capability";
pub const DISABLE_CAPABILITY: &str = "disable_capability";
pub const GET_SERVER_INFO: &str = "get_server_info";

/// Arguments of `search_tools`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SearchToolsArgs {
    /// Keywords matched against tool names, summaries and capabilities.
    #[serde(default)]
    pub query: String,
    /// Maximum number of previews. Defaults to the server's
    /// `max_tools_in_context`.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Arguments of `describe_tools`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeToolsArgs {
    /// Tool names returned by `search_tools`.
    pub tool_names: Vec<String>,
}

/// Arguments of `execute_tool`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteToolArgs {
    /// Name of the tool to run.
    pub tool_name: String,
    /// Arguments matching the tool's input schema. `null` or missing means
    /// no arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// Arguments of `enable_capability` and `disable_capability`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CapabilityArgs {
    /// Capability id as listed by `list_capabilities`.
    pub capability_name: String,
}

/// Tools without arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// One entry of `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct MetaToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn build_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

/// Every meta-tool, in the order clients should read them.
pub fn meta_tool_definitions() -> Vec<MetaToolDefinition> {
    vec![
        MetaToolDefinition {
            name: SEARCH_TOOLS,
            description: "Search for relevant tools by keyword. Returns minimal previews \
                          (name, summary, capability). Step 1 of progressive discovery.",
            input_schema: build_schema::<SearchToolsArgs>(),
        },
        MetaToolDefinition {
            name: DESCRIBE_TOOLS,
            description: "Get full input schemas for specific tools. \
                          Step 2 of progressive discovery.",
            input_schema: build_schema::<DescribeToolsArgs>(),
        },
        MetaToolDefinition {
            name: EXECUTE_TOOL,
            description: "Execute a tool with arguments matching its schema. \
                          Step 3 of progressive discovery.",
            input_schema: build_schema::<ExecuteToolArgs>(),
        },
        MetaToolDefinition {
            name: LIST_CAPABILITIES,
            description: "List all capabilities with their state and tools.",
            input_schema: build_schema::<NoArgs>(),
        },
        MetaToolDefinition {
            name: ENABLE_CAPABILITY,
            description: "Re-enable a capability that failed to initialize.",
            input_schema: build_schema::<CapabilityArgs>(),
        },
        MetaToolDefinition {
            name: DISABLE_CAPABILITY,
            description: "Release a capability. It re-initializes on next use.",
            input_schema: build_schema::<CapabilityArgs>(),
        },
        MetaToolDefinition {
            name: GET_SERVER_INFO,
            description: "Get broker information and discovery statistics.",
            input_schema: build_schema::<NoArgs>(),
        },
    ]
}
