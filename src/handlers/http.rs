//! HTTP capability adapter.
//!
//! Options: `api_url` (required), `health_path`. Each execute POSTs
//! `{"tool", "arguments"}` to `{api_url}/tools/{tool}` and returns the JSON
//! response body.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{call_payload, required_option, InlineSchemas};
use crate::catalog::CapabilityMetadata;
use crate::registry::{CapabilityHandler, HandlerError, HandlerFactory, HandlerResult, ToolSchema};
use crate::types::CapabilityId;

pub const KIND: &str = "http";

pub fn factory() -> HandlerFactory {
    Arc::new(|meta: &CapabilityMetadata| {
        let handler: Arc<dyn CapabilityHandler> = Arc::new(HttpHandler::from_metadata(meta)?);
        Ok(handler)
    })
}

#[derive(Debug)]
pub struct HttpHandler {
    capability: CapabilityId,
    base_url: String,
    health_path: Option<String>,
    schemas: InlineSchemas,
    client: OnceLock<reqwest::Client>,
}

impl HttpHandler {
    pub fn from_metadata(meta: &CapabilityMetadata) -> HandlerResult<Self> {
        let base_url = required_option(meta, "api_url")?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            capability: meta.id.clone(),
            base_url,
            health_path: meta.option_str("health_path").map(str::to_string),
            schemas: InlineSchemas::from_metadata(meta)?,
            client: OnceLock::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn client(&self) -> HandlerResult<&reqwest::Client> {
        self.client.get().ok_or_else(|| {
            HandlerError::failed(format!("capability '{}' is not initialized", self.capability))
        })
    }
}

#[async_trait]
impl CapabilityHandler for HttpHandler {
    async fn initialize(&self) -> HandlerResult<()> {
        let client = reqwest::Client::builder().build()?;

        if let Some(path) = &self.health_path {
            let url = self.url(path);
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(HandlerError::failed(format!(
                    "health check {} returned {}",
                    url,
                    response.status()
                )));
            }
            tracing::debug!(capability = %self.capability, url = %url, "health check passed");
        }

        let _ = self.client.set(client);
        Ok(())
    }

    async fn get_tool_schema(&self, tool_name: &str) -> HandlerResult<ToolSchema> {
        self.schemas.get(tool_name)
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> HandlerResult<Value> {
        let url = self.url(&format!("tools/{}", tool_name));
        let response = self
            .client()?
            .post(&url)
            .json(&call_payload(tool_name, arguments))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HandlerError::failed(format!(
                "{} returned {}: {}",
                url,
                status,
                body.trim()
            )));
        }
        Ok(response.json().await?)
    }
}
