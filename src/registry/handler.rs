//! Capability handler contract and handler factories.
//!
//! Every integrated capability implements [`CapabilityHandler`]. The registry
//! only ever talks to a capability through this trait: it builds a handler
//! from a [`HandlerFactory`] on first use, initializes it exactly once, and
//! routes schema lookups and executions to it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::catalog::CapabilityMetadata;
use crate::handlers;
use crate::registry::schema::ToolSchema;

/// Result alias for handler operations.
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Failure raised by a capability handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler does not know the requested tool.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Invalid handler configuration in the catalog.
    #[error("invalid capability configuration: {0}")]
    Config(String),

    /// Generic failure reported by the capability.
    #[error("{0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Contract implemented by every capability.
///
/// `initialize` need not be idempotent: the registry guarantees it is called
/// at most once per arming of the capability. `cleanup` is best-effort; its
/// failures are logged and never fail a disable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Prepare long-lived resources (verify binaries, open clients, ...).
    async fn initialize(&self) -> HandlerResult<()>;

    /// Full input schema for one of this capability's tools.
    async fn get_tool_schema(&self, tool_name: &str) -> HandlerResult<ToolSchema>;

    /// Run a tool with already-validated arguments.
    async fn execute(&self, tool_name: &str, arguments: Value) -> HandlerResult<Value>;

    /// Release resources. Called when the capability is disabled or the
    /// broker shuts down.
    async fn cleanup(&self) -> HandlerResult<()> {
        Ok(())
    }
}

/// Builds a fresh, uninitialized handler for a capability.
pub type HandlerFactory =
    Arc<dyn Fn(&CapabilityMetadata) -> HandlerResult<Arc<dyn CapabilityHandler>> + Send + Sync>;

/// Handler factories keyed by capability `type`.
#[derive(Clone, Default)]
pub struct HandlerFactories {
    factories: HashMap<String, HandlerFactory>,
}

impl fmt::Debug for HandlerFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFactories")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl HandlerFactories {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Factories for the adapters shipped with the broker
    /// (`subprocess`, `http`).
    pub fn with_builtin() -> Self {
        let mut factories = Self::new();
        factories.register(handlers::subprocess::KIND, handlers::subprocess::factory());
        factories.register(handlers::http::KIND, handlers::http::factory());
        factories
    }

    /// Register (or replace) the factory for a capability type.
    pub fn register(&mut self, kind: impl Into<String>, factory: HandlerFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn get(&self, kind: &str) -> Option<HandlerFactory> {
        self.factories.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered capability types, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
