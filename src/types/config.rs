//! Configuration structures.
//!
//! Configuration lives next to the capability list in the catalog document
//! and can be overridden from the command line or environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrokerConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Registry lifecycle, cache and timeout configuration.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Progressive discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported to clients during the protocol handshake.
    pub name: String,

    /// Maximum accepted request line in bytes.
    pub max_line_bytes: usize,

    /// Bounded channel capacity between request tasks and the stdout writer.
    pub write_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "toolbroker".to_string(),
            max_line_bytes: 4 * 1024 * 1024,
            write_channel_capacity: 64,
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Age after which a cached tool schema is refetched from its handler.
    #[serde(with = "humantime_serde")]
    pub schema_ttl: Duration,

    /// Default bound on a single handler execute call. Capabilities may
    /// override it with their own `timeout`.
    #[serde(with = "humantime_serde")]
    pub execute_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            schema_ttl: Duration::from_secs(3600),
            execute_timeout: Duration::from_secs(30),
        }
    }
}

/// Progressive discovery configuration and token-estimation constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Discovery mode reported in server info.
    pub mode: String,

    /// Estimated tokens per search preview.
    pub search_only_tokens: u32,

    /// Estimated tokens per full tool schema.
    pub describe_only_tokens: u32,

    /// Estimated overhead of one tool execution.
    pub execution_tokens: u32,

    /// Estimated cost of loading every tool schema statically.
    pub static_baseline_tokens: u32,

    /// Default number of search results offered to clients.
    pub max_tools_in_context: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: "progressive".to_string(),
            search_only_tokens: 5,
            describe_only_tokens: 200,
            execution_tokens: 50,
            static_baseline_tokens: 10_000,
            max_tools_in_context: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.registry.schema_ttl, Duration::from_secs(3600));
        assert_eq!(config.registry.execute_timeout, Duration::from_secs(30));
        assert_eq!(config.discovery.mode, "progressive");
        assert_eq!(config.discovery.max_tools_in_context, 10);
    }

    #[test]
    fn test_humantime_durations_from_yaml() {
        let yaml = "registry:\n  schema_ttl: 5m\n  execute_timeout: 1500ms\n";
        let config: BrokerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.registry.schema_ttl, Duration::from_secs(300));
        assert_eq!(config.registry.execute_timeout, Duration::from_millis(1500));
        // Untouched sections keep their defaults
        assert_eq!(config.discovery.describe_only_tokens, 200);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let yaml = "discovery:\n  max_tools_in_context: 3\n";
        let config: BrokerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.discovery.max_tools_in_context, 3);
        assert_eq!(config.discovery.search_only_tokens, 5);
        assert_eq!(config.registry.execute_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_token_constants_from_yaml() {
        let yaml = "discovery:\n  search_only_tokens: 50\n  describe_only_tokens: 150\n";
        let config: BrokerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.discovery.search_only_tokens, 50);
        assert_eq!(config.discovery.describe_only_tokens, 150);
        assert_eq!(config.discovery.execution_tokens, 50);
    }
}
