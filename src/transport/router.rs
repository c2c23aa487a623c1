//! JSON-RPC router: maps protocol methods onto the discovery engine.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::discovery::{DiscoveryEngine, ErrorDetail};
use crate::transport::tools::{
    meta_tool_definitions, CapabilityArgs, DescribeToolsArgs, ExecuteToolArgs, SearchToolsArgs,
    DESCRIBE_TOOLS, DISABLE_CAPABILITY, ENABLE_CAPABILITY, EXECUTE_TOOL, GET_SERVER_INFO,
    LIST_CAPABILITIES, SEARCH_TOOLS,
};
use crate::types::{Error, Result, ServerConfig};
use crate::validation::validate_non_empty;

/// Protocol revision announced in the `initialize` reply.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {}", method))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, msg)
    }

    fn to_value(&self) -> Value {
        let mut obj = json!({"code": self.code, "message": self.message});
        if let Some(data) = &self.data {
            obj["data"] = data.clone();
        }
        obj
    }
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        let code = if err.is_client_error() {
            INVALID_PARAMS
        } else {
            INTERNAL_ERROR
        };
        Self {
            code,
            message: err.to_string(),
            data: Some(json!({"kind": err.kind()})),
        }
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

pub fn error_response(id: Value, error: &RpcError) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": error.to_value()})
}

// =============================================================================
// Shared helpers
// =============================================================================

pub fn str_field(body: &Value, key: &str) -> Result<String> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::validation(format!("Missing required field: {}", key)))
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> std::result::Result<T, RpcError> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| RpcError::invalid_params(format!("invalid arguments for {}: {}", tool, e)))
}

fn to_json<T: Serialize>(value: &T) -> std::result::Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

fn error_payload(err: &Error) -> Value {
    json!({ "error": ErrorDetail::from(err) })
}

/// MCP `tools/call` result: one text block plus the error flag.
fn tool_result(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

// =============================================================================
// Router
// =============================================================================

/// Routes decoded JSON-RPC messages.
#[derive(Debug, Clone)]
pub struct Router {
    engine: Arc<DiscoveryEngine>,
    server: ServerConfig,
}

impl Router {
    pub fn new(engine: Arc<DiscoveryEngine>, server: ServerConfig) -> Self {
        Self { engine, server }
    }

    pub fn engine(&self) -> &Arc<DiscoveryEngine> {
        &self.engine
    }

    /// Handle one message. Returns the response, or `None` for notifications.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        let Some(obj) = message.as_object() else {
            return Some(error_response(
                Value::Null,
                &RpcError::invalid_request("request must be a JSON object"),
            ));
        };
        let id = obj.get("id").cloned();

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                &RpcError::invalid_request("missing method"),
            ));
        };
        let params = obj.get("params").cloned().unwrap_or(Value::Null);

        let Some(id) = id else {
            tracing::debug!(method, "notification");
            return None;
        };

        let outcome = self.dispatch(method, params).await;
        Some(match outcome {
            Ok(result) => success_response(id, result),
            Err(err) => {
                tracing::debug!(method, code = err.code, error = %err.message, "request failed");
                error_response(id, &err)
            }
        })
    }

    async fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, RpcError> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {
                    "name": self.server.name,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": to_json(&meta_tool_definitions())? })),
            "tools/call" => self.call_tool(params).await,
            other => Err(RpcError::method_not_found(other)),
        }
    }

    async fn call_tool(&self, params: Value) -> std::result::Result<Value, RpcError> {
        let name = str_field(&params, "name").map_err(|e| RpcError::invalid_params(e.to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        tracing::info!(tool = %name, "tools/call");

        let engine = &self.engine;
        let (payload, is_error) = match name.as_str() {
            SEARCH_TOOLS => {
                let args: SearchToolsArgs = parse_args(&name, arguments)?;
                let limit = args
                    .max_results
                    .unwrap_or(engine.config().max_tools_in_context);
                let previews = engine.search_tools(&args.query, Some(limit));
                let estimate = engine.estimate_token_cost(previews.len(), 0, false);
                let payload = json!({
                    "query": args.query,
                    "count": previews.len(),
                    "tools": to_json(&previews)?,
                    "estimate": to_json(&estimate)?,
                    "next_step": "Use describe_tools(tool_names) to get full schemas",
                });
                (payload, false)
            }
            DESCRIBE_TOOLS => {
                let args: DescribeToolsArgs = parse_args(&name, arguments)?;
                match engine.describe_tools(&args.tool_names).await {
                    Ok(schemas) => (
                        json!({
                            "count": schemas.len(),
                            "signatures": schemas.iter().map(|s| s.signature()).collect::<Vec<_>>(),
                            "tools": to_json(&schemas)?,
                            "next_step": "Use execute_tool(tool_name, arguments) to run a tool",
                        }),
                        false,
                    ),
                    Err(e) => (error_payload(&e), true),
                }
            }
            EXECUTE_TOOL => {
                let args: ExecuteToolArgs = parse_args(&name, arguments)?;
                let envelope = engine
                    .execute_tool(&args.tool_name, args.arguments)
                    .await;
                (to_json(&envelope)?, !envelope.is_success())
            }
            LIST_CAPABILITIES => {
                let capabilities = engine.list_capabilities().await;
                (
                    json!({"count": capabilities.len(), "capabilities": to_json(&capabilities)?}),
                    false,
                )
            }
            ENABLE_CAPABILITY | DISABLE_CAPABILITY => {
                let args: CapabilityArgs = parse_args(&name, arguments)?;
                let outcome = match validate_non_empty(&args.capability_name, "capability_name") {
                    Err(e) => Err(e),
                    Ok(()) if name == ENABLE_CAPABILITY => {
                        engine.enable_capability(&args.capability_name).await
                    }
                    Ok(()) => engine.disable_capability(&args.capability_name).await,
                };
                match outcome {
                    Ok(state) => (
                        json!({"capability": args.capability_name, "state": state}),
                        false,
                    ),
                    Err(e) => (error_payload(&e), true),
                }
            }
            GET_SERVER_INFO => (to_json(&engine.server_info().await)?, false),
            other => return Err(RpcError::invalid_params(format!("unknown tool: {}", other))),
        };

        Ok(tool_result(&payload, is_error))
    }
}
