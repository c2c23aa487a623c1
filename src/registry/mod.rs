//! Dynamic tool registry.
//!
//! Owns every capability's lifecycle and routes schema lookups and
//! executions to handlers, initializing a capability lazily on first use.
//!
//! Concurrency model:
//! - Capability map behind an `RwLock`, keyed and ordered by catalog
//!   declaration.
//! - Per-capability init gate (`Mutex<()>`) collapses concurrent first uses
//!   into a single initialization. The handler is built inside the gate, so
//!   losing callers never construct one.
//! - Executions are not serialized; each is bounded by a timeout.

mod handler;
mod record;
mod schema;

pub use handler::{
    CapabilityHandler, HandlerError, HandlerFactories, HandlerFactory, HandlerResult,
};
#[cfg(test)]
pub use handler::MockCapabilityHandler;
pub use record::{CapabilityInfo, CapabilityState};
pub use schema::{CachedSchema, SchemaCache, ToolSchema};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::Instrument;

use crate::catalog::{CapabilityMetadata, ToolCatalog};
use crate::types::{CallId, CapabilityId, Error, RegistryConfig, Result};
use crate::validation::validate_arguments;
use record::CapabilityRecord;

/// Registry of capabilities and their handlers.
///
/// Shared via `Arc`; every operation takes `&self`.
#[derive(Debug)]
pub struct DynamicToolRegistry {
    catalog: Arc<ToolCatalog>,
    config: RegistryConfig,
    records: RwLock<IndexMap<CapabilityId, Arc<CapabilityRecord>>>,
    schemas: SchemaCache,
}

impl DynamicToolRegistry {
    /// Create a registry with one `Registered` record per catalog capability.
    ///
    /// Fails with [`Error::Config`] if a capability type has no factory or a
    /// tool routes to a capability without a record.
    pub fn from_catalog(
        catalog: Arc<ToolCatalog>,
        factories: &HandlerFactories,
        config: RegistryConfig,
    ) -> Result<Self> {
        let mut records = IndexMap::with_capacity(catalog.capabilities().len());
        for meta in catalog.capabilities() {
            let factory = factories.get(&meta.kind).ok_or_else(|| {
                Error::config(format!(
                    "no handler factory for type '{}' (capability '{}')",
                    meta.kind, meta.id
                ))
            })?;
            records.insert(
                meta.id.clone(),
                Arc::new(CapabilityRecord::new(meta.clone(), factory)),
            );
        }

        for tool in catalog.list_tools(None) {
            if !records.contains_key(&tool.capability_id) {
                return Err(Error::config(format!(
                    "tool '{}' routes to unknown capability '{}'",
                    tool.name, tool.capability_id
                )));
            }
        }

        tracing::info!(
            capabilities = records.len(),
            schema_ttl = ?config.schema_ttl,
            execute_timeout = ?config.execute_timeout,
            "registry created"
        );

        Ok(Self {
            schemas: SchemaCache::new(config.schema_ttl),
            catalog,
            config,
            records: RwLock::new(records),
        })
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    async fn record(&self, id: &str) -> Result<Arc<CapabilityRecord>> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("capability '{}'", id)))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a capability, or replace the factory of an existing one.
    ///
    /// Replacing is allowed only while the capability is `Registered` or
    /// `Failed`; the state is left unchanged. A `Ready` capability, or one
    /// with an initialization in flight, yields [`Error::Conflict`].
    pub async fn register_capability(
        &self,
        metadata: CapabilityMetadata,
        factory: HandlerFactory,
    ) -> Result<()> {
        let mut records = self.records.write().await;

        let Some(existing) = records.get(&metadata.id).cloned() else {
            tracing::info!(capability = %metadata.id, kind = %metadata.kind, "capability registered");
            records.insert(
                metadata.id.clone(),
                Arc::new(CapabilityRecord::new(metadata, factory)),
            );
            return Ok(());
        };

        // The gate is held by either an initialization or a disable.
        let Ok(_gate) = existing.init_gate.try_lock() else {
            let activity = match existing.slot.lock().await.state {
                CapabilityState::Initializing => "initializing",
                _ => "being disabled",
            };
            return Err(Error::conflict(format!(
                "capability '{}' is {}",
                metadata.id, activity
            )));
        };
        let mut slot = existing.slot.lock().await;
        match slot.state {
            CapabilityState::Registered | CapabilityState::Failed => {
                slot.factory = factory;
                tracing::info!(capability = %metadata.id, state = %slot.state, "capability factory replaced");
                Ok(())
            }
            state => Err(Error::conflict(format!(
                "capability '{}' is {}",
                metadata.id, state
            ))),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Lazy-initialization gate. Returns the capability's live handler.
    ///
    /// The first caller builds and initializes the handler; concurrent callers
    /// wait on the gate and observe the outcome. A failure is recorded and
    /// returned as [`Error::Init`]; later callers get
    /// [`Error::CapabilityUnavailable`] until the capability is re-enabled.
    pub async fn ensure_ready(&self, id: &str) -> Result<Arc<dyn CapabilityHandler>> {
        let record = self.record(id).await?;

        if let Some(handler) = Self::settled(&record).await? {
            return Ok(handler);
        }

        let _gate = record.init_gate.lock().await;

        // Re-check: the previous gate holder may have finished.
        let factory = {
            let mut slot = record.slot.lock().await;
            match slot.state {
                CapabilityState::Ready => {
                    if let Some(handler) = &slot.handler {
                        return Ok(handler.clone());
                    }
                }
                CapabilityState::Failed => {
                    return Err(Self::unavailable(id, slot.last_error.as_deref()));
                }
                // Initializing under the gate means a prior attempt was
                // cancelled mid-flight; start over.
                CapabilityState::Registered | CapabilityState::Initializing => {}
            }
            slot.state = CapabilityState::Initializing;
            slot.factory.clone()
        };

        tracing::info!(capability = %id, "initializing capability");
        let started = tokio::time::Instant::now();

        let outcome = match factory(record.metadata.as_ref()) {
            Ok(handler) => handler.initialize().await.map(|()| handler),
            Err(e) => Err(e),
        };

        let mut slot = record.slot.lock().await;
        match outcome {
            Ok(handler) => {
                slot.state = CapabilityState::Ready;
                slot.handler = Some(handler.clone());
                slot.last_error = None;
                slot.ready_since = Some(Utc::now());
                slot.initializations += 1;
                tracing::info!(
                    capability = %id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "capability ready"
                );
                Ok(handler)
            }
            Err(e) => {
                let message = e.to_string();
                slot.state = CapabilityState::Failed;
                slot.handler = None;
                slot.last_error = Some(message.clone());
                tracing::error!(capability = %id, error = %message, "capability initialization failed");
                Err(Error::Init {
                    capability: id.to_string(),
                    message,
                })
            }
        }
    }

    /// Handler if Ready, error if Failed, `None` if initialization is needed.
    async fn settled(record: &CapabilityRecord) -> Result<Option<Arc<dyn CapabilityHandler>>> {
        let slot = record.slot.lock().await;
        match slot.state {
            CapabilityState::Ready => Ok(slot.handler.clone()),
            CapabilityState::Failed => Err(Self::unavailable(
                record.metadata.id.as_str(),
                slot.last_error.as_deref(),
            )),
            CapabilityState::Registered | CapabilityState::Initializing => Ok(None),
        }
    }

    fn unavailable(id: &str, last_error: Option<&str>) -> Error {
        Error::unavailable(id, last_error.unwrap_or("initialization failed"))
    }

    /// Re-arm a `Failed` capability. No-op for every other state.
    pub async fn enable(&self, id: &str) -> Result<CapabilityState> {
        let record = self.record(id).await?;
        let mut slot = record.slot.lock().await;
        if slot.state == CapabilityState::Failed {
            slot.state = CapabilityState::Registered;
            slot.last_error = None;
            tracing::info!(capability = %id, "capability re-enabled");
        }
        Ok(slot.state)
    }

    /// Release a `Ready` capability back to `Registered`.
    ///
    /// Waits for an in-flight initialization first. Cleanup failures are
    /// logged and never surfaced. The capability's schemas are dropped from
    /// the cache.
    pub async fn disable(&self, id: &str) -> Result<CapabilityState> {
        let record = self.record(id).await?;
        let _gate = record.init_gate.lock().await;

        let handler = {
            let mut slot = record.slot.lock().await;
            if slot.state != CapabilityState::Ready {
                return Ok(slot.state);
            }
            slot.state = CapabilityState::Registered;
            slot.ready_since = None;
            slot.handler.take()
        };

        if let Some(handler) = handler {
            if let Err(e) = handler.cleanup().await {
                tracing::warn!(capability = %id, error = %e, "capability cleanup failed");
            }
        }
        let dropped = self.schemas.invalidate_many(&record.metadata.tools).await;
        tracing::info!(capability = %id, dropped_schemas = dropped, "capability disabled");

        Ok(CapabilityState::Registered)
    }

    /// Disable every capability, running cleanup on each live handler.
    pub async fn shutdown(&self) {
        let ids: Vec<CapabilityId> = self.records.read().await.keys().cloned().collect();
        let results = futures::future::join_all(ids.iter().map(|id| self.disable(id.as_str()))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(capability = %id, error = %e, "shutdown of capability failed");
            }
        }
        tracing::info!(capabilities = ids.len(), "registry shut down");
    }

    /// Initialize every capability declared with `lazy_load: false`.
    ///
    /// Failures are logged and leave the capability `Failed`. Returns how
    /// many capabilities became ready.
    pub async fn preload_eager(&self) -> usize {
        let eager: Vec<CapabilityId> = self
            .catalog
            .capabilities()
            .iter()
            .filter(|meta| !meta.lazy)
            .map(|meta| meta.id.clone())
            .collect();

        let results =
            futures::future::join_all(eager.iter().map(|id| self.ensure_ready(id.as_str()))).await;
        let mut ready = 0;
        for (id, result) in eager.iter().zip(results) {
            match result {
                Ok(_) => ready += 1,
                Err(e) => tracing::warn!(capability = %id, error = %e, "eager initialization failed"),
            }
        }
        ready
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn state(&self, id: &str) -> Result<CapabilityState> {
        Ok(self.record(id).await?.state().await)
    }

    pub async fn capability_info(&self, id: &str) -> Result<CapabilityInfo> {
        Ok(self.record(id).await?.info().await)
    }

    /// Snapshot of every capability, in declaration order.
    pub async fn capabilities(&self) -> Vec<CapabilityInfo> {
        let records: Vec<Arc<CapabilityRecord>> =
            self.records.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(records.len());
        for record in records {
            infos.push(record.info().await);
        }
        infos
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Full schema for a tool, from cache or from its handler.
    pub async fn get_tool_schema(&self, tool: &str) -> Result<Arc<ToolSchema>> {
        Ok(self.cached_schema(tool).await?.schema)
    }

    async fn cached_schema(&self, tool: &str) -> Result<CachedSchema> {
        let capability = self.catalog.capability_for_tool(tool)?.clone();
        let handler = self.ensure_ready(capability.as_str()).await?;

        if let Some(cached) = self.schemas.get_fresh(tool).await {
            tracing::debug!(tool, "schema cache hit");
            return Ok(cached);
        }

        tracing::debug!(tool, capability = %capability, "schema cache miss");
        let mut schema = handler
            .get_tool_schema(tool)
            .await
            .map_err(|e| Self::handler_error(tool, &capability, e))?;
        schema.name = tool.to_string();

        let cached = CachedSchema::compile(schema)?;
        self.schemas.insert(tool, cached.clone()).await;
        Ok(cached)
    }

    /// Drop one cached schema. Returns true if it was cached.
    pub async fn invalidate_schema(&self, tool: &str) -> bool {
        self.schemas.invalidate(tool).await
    }

    /// Drop every cached schema. Returns how many were cached.
    pub async fn invalidate_all(&self) -> usize {
        self.schemas.clear().await
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Validate arguments and run a tool under its timeout.
    ///
    /// A `null` argument value is treated as an empty object. Neither a
    /// timeout nor a handler failure changes the capability's state.
    pub async fn execute(&self, tool: &str, arguments: Value) -> Result<Value> {
        let call_id = CallId::new();
        let span = tracing::info_span!("execute", tool, call_id = %call_id);
        self.execute_inner(tool, arguments).instrument(span).await
    }

    async fn execute_inner(&self, tool: &str, arguments: Value) -> Result<Value> {
        let capability = self.catalog.capability_for_tool(tool)?.clone();
        let handler = self.ensure_ready(capability.as_str()).await?;
        let cached = self.cached_schema(tool).await?;

        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        validate_arguments(tool, &cached.validator, &arguments)?;

        let timeout = self.timeout_for(&capability);
        let started = tokio::time::Instant::now();
        match tokio::time::timeout(timeout, handler.execute(tool, arguments)).await {
            Ok(Ok(value)) => {
                tracing::debug!(
                    capability = %capability,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool executed"
                );
                Ok(value)
            }
            Ok(Err(e)) => {
                tracing::warn!(capability = %capability, error = %e, "tool execution failed");
                Err(Self::handler_error(tool, &capability, e))
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(capability = %capability, timeout_ms, "tool execution timed out");
                Err(Error::Timeout {
                    tool: tool.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    fn timeout_for(&self, capability: &CapabilityId) -> Duration {
        self.catalog
            .describe_capability(capability.as_str())
            .ok()
            .and_then(|meta| meta.timeout)
            .unwrap_or(self.config.execute_timeout)
    }

    fn handler_error(tool: &str, capability: &CapabilityId, err: HandlerError) -> Error {
        match err {
            HandlerError::UnknownTool(name) => Error::unknown_tool(name),
            other => Error::Execution {
                tool: tool.to_string(),
                capability: capability.to_string(),
                message: other.to_string(),
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogDocument;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CATALOG: &str = r#"
capabilities:
  cap_code:
    enabled: true
    type: mock
    tools:
      - name: search_code
        summary: Search codebase semantically
      - name: find_symbol
        summary: Find symbol definition
  cap_docs:
    enabled: true
    type: mock
    lazy_load: false
    timeout: 50ms
    tools: [get_library_docs]
"#;

    fn query_schema(tool: &str) -> ToolSchema {
        ToolSchema::new(
            tool,
            format!("{} tool", tool),
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"],
            }),
        )
    }

    fn factory_for(handler: Arc<dyn CapabilityHandler>) -> HandlerFactory {
        Arc::new(move |_meta: &CapabilityMetadata| Ok(handler.clone()))
    }

    fn registry_with(handler: Arc<dyn CapabilityHandler>, config: RegistryConfig) -> DynamicToolRegistry {
        let mut factories = HandlerFactories::new();
        factories.register("mock", factory_for(handler));
        let doc = CatalogDocument::from_yaml_str(CATALOG).unwrap();
        let catalog = Arc::new(ToolCatalog::load(&doc, &factories).unwrap());
        DynamicToolRegistry::from_catalog(catalog, &factories, config).unwrap()
    }

    /// Handler double that counts calls and can be slowed down.
    #[derive(Default)]
    struct CountingHandler {
        inits: AtomicUsize,
        schema_calls: AtomicUsize,
        executions: AtomicUsize,
        cleanups: AtomicUsize,
        init_delay: Duration,
        exec_delay: Duration,
        cleanup_delay: Duration,
        fail_init: bool,
    }

    #[async_trait::async_trait]
    impl CapabilityHandler for CountingHandler {
        async fn initialize(&self) -> HandlerResult<()> {
            tokio::time::sleep(self.init_delay).await;
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(HandlerError::failed("binary not found"));
            }
            Ok(())
        }

        async fn get_tool_schema(&self, tool_name: &str) -> HandlerResult<ToolSchema> {
            self.schema_calls.fetch_add(1, Ordering::SeqCst);
            Ok(query_schema(tool_name))
        }

        async fn execute(&self, tool_name: &str, arguments: Value) -> HandlerResult<Value> {
            tokio::time::sleep(self.exec_delay).await;
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"tool": tool_name, "echo": arguments}))
        }

        async fn cleanup(&self) -> HandlerResult<()> {
            tokio::time::sleep(self.cleanup_delay).await;
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_registered_before_use() {
        let registry = registry_with(Arc::new(CountingHandler::default()), RegistryConfig::default());
        let infos = registry.capabilities().await;
        let ids: Vec<&str> = infos.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["cap_code", "cap_docs"]);
        assert!(infos.iter().all(|i| i.state == CapabilityState::Registered));
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let handler = Arc::new(CountingHandler {
            init_delay: Duration::from_millis(50),
            ..Default::default()
        });
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        let (a, b, c) = tokio::join!(
            registry.execute("search_code", json!({"query": "auth"})),
            registry.execute("find_symbol", json!({"query": "User"})),
            registry.ensure_ready("cap_code"),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert!(c.is_ok());
        assert_eq!(handler.inits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Ready);
        assert_eq!(registry.capability_info("cap_code").await.unwrap().initializations, 1);
    }

    #[tokio::test]
    async fn test_init_failure_is_terminal_until_enable() {
        let handler = Arc::new(CountingHandler {
            fail_init: true,
            ..Default::default()
        });
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        let err = registry.ensure_ready("cap_code").await.err().unwrap();
        assert_eq!(err.kind(), "init_error");
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Failed);

        let err = registry
            .execute("search_code", json!({"query": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "capability_unavailable");
        assert!(err.to_string().contains("binary not found"));
        assert_eq!(handler.inits.load(Ordering::SeqCst), 1);

        assert_eq!(registry.enable("cap_code").await.unwrap(), CapabilityState::Registered);
        assert!(registry.capability_info("cap_code").await.unwrap().last_error.is_none());
        assert!(registry.ensure_ready("cap_code").await.is_err());
        assert_eq!(handler.inits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failed_initialization() {
        let handler = Arc::new(CountingHandler {
            init_delay: Duration::from_millis(50),
            fail_init: true,
            ..Default::default()
        });
        let registry = Arc::new(registry_with(handler.clone(), RegistryConfig::default()));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let outcome = if i % 2 == 0 {
                        registry.execute("search_code", json!({"query": "x"})).await.map(|_| ())
                    } else {
                        registry.ensure_ready("cap_code").await.map(|_| ())
                    };
                    outcome.err().map(|e| e.kind())
                })
            })
            .collect();

        let mut kinds = Vec::new();
        for task in tasks {
            kinds.push(task.await.unwrap());
        }

        assert_eq!(handler.inits.load(Ordering::SeqCst), 1);
        assert_eq!(kinds.iter().filter(|k| **k == Some("init_error")).count(), 1);
        assert_eq!(
            kinds.iter().filter(|k| **k == Some("capability_unavailable")).count(),
            7
        );
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Failed);
    }

    #[tokio::test]
    async fn test_enable_is_noop_unless_failed() {
        let registry = registry_with(Arc::new(CountingHandler::default()), RegistryConfig::default());
        assert_eq!(registry.enable("cap_code").await.unwrap(), CapabilityState::Registered);
        registry.ensure_ready("cap_code").await.unwrap();
        assert_eq!(registry.enable("cap_code").await.unwrap(), CapabilityState::Ready);
        assert_eq!(registry.enable("nope").await.unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_missing_required_field_never_reaches_handler() {
        let handler = Arc::new(CountingHandler::default());
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        let err = registry.execute("search_code", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(handler.executions.load(Ordering::SeqCst), 0);

        let err = registry.execute("search_code", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = registry_with(Arc::new(CountingHandler::default()), RegistryConfig::default());
        let err = registry.execute("nope", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");
        let err = registry.get_tool_schema("nope").await.unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Registered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_cached_until_ttl() {
        let handler = Arc::new(CountingHandler::default());
        let config = RegistryConfig {
            schema_ttl: Duration::from_secs(60),
            ..Default::default()
        };
        let registry = registry_with(handler.clone(), config);

        let first = registry.get_tool_schema("search_code").await.unwrap();
        registry.get_tool_schema("search_code").await.unwrap();
        assert_eq!(handler.schema_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.name, "search_code");

        tokio::time::advance(Duration::from_secs(61)).await;
        registry.get_tool_schema("search_code").await.unwrap();
        assert_eq!(handler.schema_calls.load(Ordering::SeqCst), 2);

        assert!(registry.invalidate_schema("search_code").await);
        registry.get_tool_schema("search_code").await.unwrap();
        assert_eq!(handler.schema_calls.load(Ordering::SeqCst), 3);
        assert_eq!(registry.invalidate_all().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_capability_ready() {
        let handler = Arc::new(CountingHandler {
            exec_delay: Duration::from_millis(200),
            ..Default::default()
        });
        let registry = registry_with(handler, RegistryConfig::default());

        // cap_docs overrides the timeout to 50ms.
        let err = registry
            .execute("get_library_docs", json!({"query": "tokio"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { timeout_ms: 50, .. }));
        assert_eq!(registry.state("cap_docs").await.unwrap(), CapabilityState::Ready);

        // cap_code uses the 30s default.
        assert!(registry
            .execute("search_code", json!({"query": "x"}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_disable_cleans_up_and_reinitializes() {
        let handler = Arc::new(CountingHandler::default());
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        registry.execute("search_code", json!({"query": "x"})).await.unwrap();
        assert_eq!(registry.disable("cap_code").await.unwrap(), CapabilityState::Registered);
        assert_eq!(handler.cleanups.load(Ordering::SeqCst), 1);

        registry.execute("search_code", json!({"query": "x"})).await.unwrap();
        assert_eq!(handler.inits.load(Ordering::SeqCst), 2);
        // Cache was dropped on disable.
        assert_eq!(handler.schema_calls.load(Ordering::SeqCst), 2);

        // Disabling a Registered capability does nothing.
        assert_eq!(registry.disable("cap_docs").await.unwrap(), CapabilityState::Registered);
        assert_eq!(handler.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_not_surfaced() {
        let mut mock = MockCapabilityHandler::new();
        mock.expect_initialize().times(1).returning(|| Ok(()));
        mock.expect_cleanup()
            .times(1)
            .returning(|| Err(HandlerError::failed("socket already closed")));
        let registry = registry_with(Arc::new(mock), RegistryConfig::default());

        registry.ensure_ready("cap_code").await.unwrap();
        assert_eq!(registry.disable("cap_code").await.unwrap(), CapabilityState::Registered);
    }

    #[tokio::test]
    async fn test_handler_failure_maps_to_execution_error() {
        let mut mock = MockCapabilityHandler::new();
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_get_tool_schema()
            .returning(|tool| Ok(query_schema(tool)));
        mock.expect_execute()
            .returning(|_, _| Err(HandlerError::failed("exit status 2")));
        let registry = registry_with(Arc::new(mock), RegistryConfig::default());

        let err = registry
            .execute("search_code", json!({"query": "x"}))
            .await
            .unwrap_err();
        match err {
            Error::Execution { tool, capability, message } => {
                assert_eq!(tool, "search_code");
                assert_eq!(capability, "cap_code");
                assert_eq!(message, "exit status 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Ready);
    }

    #[tokio::test]
    async fn test_schema_name_normalized() {
        let mut mock = MockCapabilityHandler::new();
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_get_tool_schema()
            .returning(|_| Ok(query_schema("something_else")));
        let registry = registry_with(Arc::new(mock), RegistryConfig::default());

        let schema = registry.get_tool_schema("find_symbol").await.unwrap();
        assert_eq!(schema.name, "find_symbol");
    }

    #[tokio::test]
    async fn test_handler_unknown_tool_maps_through() {
        let mut mock = MockCapabilityHandler::new();
        mock.expect_initialize().returning(|| Ok(()));
        mock.expect_get_tool_schema()
            .returning(|tool| Err(HandlerError::UnknownTool(tool.to_string())));
        let registry = registry_with(Arc::new(mock), RegistryConfig::default());

        let err = registry.get_tool_schema("find_symbol").await.unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");
    }

    #[tokio::test]
    async fn test_register_capability_conflicts_when_ready() {
        let handler: Arc<dyn CapabilityHandler> = Arc::new(CountingHandler::default());
        let registry = registry_with(handler.clone(), RegistryConfig::default());
        let meta = registry.catalog().describe_capability("cap_code").unwrap().clone();

        // Registered: replacement allowed, state unchanged.
        registry
            .register_capability(meta.clone(), factory_for(handler.clone()))
            .await
            .unwrap();
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Registered);

        registry.ensure_ready("cap_code").await.unwrap();
        let err = registry
            .register_capability(meta, factory_for(handler.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        // New ids are inserted as Registered.
        let fresh = CapabilityMetadata::new(CapabilityId::from_string("cap_new".into()).unwrap(), "mock");
        registry.register_capability(fresh, factory_for(handler)).await.unwrap();
        assert_eq!(registry.state("cap_new").await.unwrap(), CapabilityState::Registered);
    }

    #[tokio::test]
    async fn test_register_conflict_names_the_running_transition() {
        let handler = Arc::new(CountingHandler {
            init_delay: Duration::from_millis(100),
            cleanup_delay: Duration::from_millis(100),
            ..Default::default()
        });
        let registry = Arc::new(registry_with(handler.clone(), RegistryConfig::default()));
        let meta = registry.catalog().describe_capability("cap_code").unwrap().clone();
        let replacement = || factory_for(Arc::new(CountingHandler::default()));

        let initializing = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.ensure_ready("cap_code").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = registry
            .register_capability(meta.clone(), replacement())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert!(err.to_string().contains("is initializing"), "{err}");
        initializing.await.unwrap().unwrap();

        let disabling = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.disable("cap_code").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let err = registry
            .register_capability(meta.clone(), replacement())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is being disabled"), "{err}");
        assert_eq!(disabling.await.unwrap().unwrap(), CapabilityState::Registered);

        registry.register_capability(meta, replacement()).await.unwrap();
    }

    #[tokio::test]
    async fn test_replaced_factory_used_after_failure() {
        let failing = Arc::new(CountingHandler {
            fail_init: true,
            ..Default::default()
        });
        let registry = registry_with(failing, RegistryConfig::default());
        assert!(registry.ensure_ready("cap_code").await.is_err());

        let meta = registry.catalog().describe_capability("cap_code").unwrap().clone();
        let healthy = Arc::new(CountingHandler::default());
        registry
            .register_capability(meta, factory_for(healthy.clone()))
            .await
            .unwrap();
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Failed);

        registry.enable("cap_code").await.unwrap();
        registry.ensure_ready("cap_code").await.unwrap();
        assert_eq!(healthy.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preload_and_shutdown() {
        let handler = Arc::new(CountingHandler::default());
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        assert_eq!(registry.preload_eager().await, 1);
        assert_eq!(registry.state("cap_docs").await.unwrap(), CapabilityState::Ready);
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Registered);

        registry.ensure_ready("cap_code").await.unwrap();
        registry.shutdown().await;
        assert_eq!(handler.cleanups.load(Ordering::SeqCst), 2);
        assert!(registry
            .capabilities()
            .await
            .iter()
            .all(|i| i.state == CapabilityState::Registered));
    }

    #[tokio::test]
    async fn test_cancelled_initialization_is_retried() {
        let handler = Arc::new(CountingHandler {
            init_delay: Duration::from_millis(200),
            ..Default::default()
        });
        let registry = registry_with(handler.clone(), RegistryConfig::default());

        let attempt = tokio::time::timeout(Duration::from_millis(20), registry.ensure_ready("cap_code")).await;
        assert!(attempt.is_err());
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Initializing);

        registry.ensure_ready("cap_code").await.unwrap();
        assert_eq!(registry.state("cap_code").await.unwrap(), CapabilityState::Ready);
        assert_eq!(handler.inits.load(Ordering::SeqCst), 1);
    }
}
