//! Progressive discovery engine.
//!
//! The three-step client protocol on top of the catalog and registry:
//!
//! 1. `search_tools`: cheap previews from catalog metadata only.
//! 2. `describe_tools`: full schemas for the tools the client picked.
//! 3. `execute_tool`: validated, bounded execution wrapped in an envelope.
//!
//! Plus administrative forwarding (`list_capabilities`, `enable_capability`,
//! `disable_capability`) and server info.

mod envelope;
mod search;
mod tokens;

pub use envelope::{EnvelopeStatus, ErrorDetail, ResultEnvelope};
pub use search::SearchIndex;
pub use tokens::{estimate_token_cost, DiscoveryStats, StatsSnapshot, TokenEstimate};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{CapabilityInfo, CapabilityState, DynamicToolRegistry, ToolSchema};
use crate::types::{CapabilityId, DiscoveryConfig, Error, Result};

/// Step-one search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPreview {
    pub name: String,
    pub summary: String,
    pub capability_id: CapabilityId,
    /// Estimated cost of describing this tool.
    pub tokens_estimate: u32,
}

/// Broker identity and discovery status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub capabilities_count: usize,
    pub ready_capabilities: Vec<CapabilityId>,
    pub discovery_mode: String,
    pub max_tools_in_context: usize,
    pub stats: StatsSnapshot,
}

/// Client-facing discovery surface.
#[derive(Debug)]
pub struct DiscoveryEngine {
    registry: Arc<DynamicToolRegistry>,
    index: SearchIndex,
    config: DiscoveryConfig,
    server_name: String,
    stats: DiscoveryStats,
}

impl DiscoveryEngine {
    pub fn new(registry: Arc<DynamicToolRegistry>, config: DiscoveryConfig) -> Self {
        let index = SearchIndex::build(registry.catalog());
        Self {
            registry,
            index,
            config,
            server_name: env!("CARGO_PKG_NAME").to_string(),
            stats: DiscoveryStats::default(),
        }
    }

    /// Name reported by [`DiscoveryEngine::server_info`].
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn registry(&self) -> &Arc<DynamicToolRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Previews of tools matching `query`, best first.
    ///
    /// Reads catalog metadata only; never initializes a capability. `limit`
    /// of `None` returns every match.
    pub fn search_tools(&self, query: &str, limit: Option<usize>) -> Vec<ToolPreview> {
        let tools = self.registry.catalog().list_tools(None);
        let previews: Vec<ToolPreview> = self
            .index
            .rank(query)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .filter_map(|pos| tools.get(pos))
            .map(|tool| ToolPreview {
                name: tool.name.clone(),
                summary: tool.summary.clone(),
                capability_id: tool.capability_id.clone(),
                tokens_estimate: self.config.describe_only_tokens,
            })
            .collect();

        self.stats.record_search(&self.config, previews.len());
        tracing::debug!(query, results = previews.len(), "search_tools");
        previews
    }

    /// Full schemas, one per requested name, in request order.
    ///
    /// Every name is checked against the catalog before any handler is
    /// touched; one unknown name fails the whole call.
    pub async fn describe_tools<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<ToolSchema>>> {
        let catalog = self.registry.catalog();
        if let Some(unknown) = names.iter().map(|n| n.as_ref()).find(|n: &&str| !catalog.has_tool(n)) {
            return Err(Error::unknown_tool(unknown));
        }

        let schemas = futures::future::try_join_all(
            names
                .iter()
                .map(|name| self.registry.get_tool_schema(name.as_ref())),
        )
        .await?;

        self.stats.record_describe(&self.config, schemas.len());
        Ok(schemas)
    }

    /// Run a tool. Never fails: every error is carried in the envelope.
    pub async fn execute_tool(&self, name: &str, arguments: Value) -> ResultEnvelope {
        let envelope = match self.registry.execute(name, arguments).await {
            Ok(result) => ResultEnvelope::success(name, result),
            Err(err) => {
                tracing::info!(tool = name, kind = err.kind(), error = %err, "execute_tool failed");
                ResultEnvelope::failure(name, &err)
            }
        };
        self.stats
            .record_execution(&self.config, envelope.is_success());
        envelope
    }

    pub async fn list_capabilities(&self) -> Vec<CapabilityInfo> {
        self.registry.capabilities().await
    }

    /// Re-arm a failed capability.
    pub async fn enable_capability(&self, id: &str) -> Result<CapabilityState> {
        self.registry.enable(id).await
    }

    /// Release a ready capability; it re-initializes on next use.
    pub async fn disable_capability(&self, id: &str) -> Result<CapabilityState> {
        self.registry.disable(id).await
    }

    pub async fn server_info(&self) -> ServerInfo {
        let capabilities = self.registry.capabilities().await;
        ServerInfo {
            name: self.server_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities_count: capabilities.len(),
            ready_capabilities: capabilities
                .into_iter()
                .filter(|c| c.state == CapabilityState::Ready)
                .map(|c| c.id)
                .collect(),
            discovery_mode: self.config.mode.clone(),
            max_tools_in_context: self.config.max_tools_in_context,
            stats: self.stats.snapshot(),
        }
    }

    pub fn estimate_token_cost(&self, previews: usize, schemas: usize, executed: bool) -> TokenEstimate {
        estimate_token_cost(&self.config, previews, schemas, executed)
    }
}
