//! Subprocess capability adapter.
//!
//! Options: `command` (required), `args`, `env`. Each execute spawns the
//! command, writes `{"tool", "arguments"}` to stdin and reads one JSON value
//! from stdout. Non-JSON output is returned as `{"output": text}`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{call_payload, required_option, InlineSchemas};
use crate::catalog::CapabilityMetadata;
use crate::registry::{CapabilityHandler, HandlerError, HandlerFactory, HandlerResult, ToolSchema};
use crate::types::CapabilityId;

pub const KIND: &str = "subprocess";

pub fn factory() -> HandlerFactory {
    Arc::new(|meta: &CapabilityMetadata| {
        let handler: Arc<dyn CapabilityHandler> = Arc::new(SubprocessHandler::from_metadata(meta)?);
        Ok(handler)
    })
}

#[derive(Debug)]
pub struct SubprocessHandler {
    capability: CapabilityId,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    schemas: InlineSchemas,
    program: OnceLock<PathBuf>,
}

impl SubprocessHandler {
    pub fn from_metadata(meta: &CapabilityMetadata) -> HandlerResult<Self> {
        let command = required_option(meta, "command")?.to_string();
        let args = match meta.options.get("args") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                HandlerError::config(format!("capability '{}': invalid args: {}", meta.id, e))
            })?,
            None => Vec::new(),
        };
        let env = match meta.options.get("env") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                HandlerError::config(format!("capability '{}': invalid env: {}", meta.id, e))
            })?,
            None => HashMap::new(),
        };

        Ok(Self {
            capability: meta.id.clone(),
            command,
            args,
            env,
            schemas: InlineSchemas::from_metadata(meta)?,
            program: OnceLock::new(),
        })
    }
}

/// Resolve a command the way a shell would: paths as-is, bare names on `PATH`.
fn resolve_program(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|full| full.is_file())
}

#[async_trait]
impl CapabilityHandler for SubprocessHandler {
    async fn initialize(&self) -> HandlerResult<()> {
        let program = resolve_program(&self.command).ok_or_else(|| {
            HandlerError::failed(format!("command '{}' not found on PATH", self.command))
        })?;
        tracing::debug!(capability = %self.capability, program = %program.display(), "command resolved");
        let _ = self.program.set(program);
        Ok(())
    }

    async fn get_tool_schema(&self, tool_name: &str) -> HandlerResult<ToolSchema> {
        self.schemas.get(tool_name)
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> HandlerResult<Value> {
        let program = self
            .program
            .get()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(&self.command));

        let mut child = Command::new(program)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let payload = serde_json::to_vec(&call_payload(tool_name, arguments))?;
        let stdin = child.stdin.take();
        // Input is fed while output is drained; stdin closes when this ends.
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&payload).await {
                // The command may exit without reading its input.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HandlerError::failed(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout.trim();
        Ok(serde_json::from_str(text).unwrap_or_else(|_| json!({ "output": text })))
    }
}
