//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Every variant except `Config` is caught
//! at the discovery boundary and surfaced to clients as an envelope error.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the broker.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or inconsistent catalog. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Client referenced a tool name absent from the catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Client referenced a capability (or other entity) that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid re-registration of a live capability.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Capability previously failed to initialize and has not been re-enabled.
    #[error("capability '{capability}' unavailable: {reason}")]
    CapabilityUnavailable { capability: String, reason: String },

    /// Arguments failed the tool's input schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// Handler execution exceeded its bound.
    #[error("timeout: tool '{tool}' exceeded {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// Handler-level failure during execute.
    #[error("execution of '{tool}' on capability '{capability}' failed: {message}")]
    Execution {
        tool: String,
        capability: String,
        message: String,
    },

    /// Handler-level failure during initialize.
    #[error("initialization of capability '{capability}' failed: {message}")]
    Init { capability: String, message: String },

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable, machine-readable error kind used in result envelopes and
    /// JSON-RPC error data.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::UnknownTool(_) => "unknown_tool",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::CapabilityUnavailable { .. } => "capability_unavailable",
            Error::Validation(_) => "validation_error",
            Error::Timeout { .. } => "timeout",
            Error::Execution { .. } => "execution_error",
            Error::Init { .. } => "init_error",
            Error::Internal(_) => "internal_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
        }
    }

    /// Whether the error was caused by the client request rather than the
    /// broker or a capability.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownTool(_) | Error::NotFound(_) | Error::Validation(_) | Error::Conflict(_)
        )
    }
}

// Convenience constructors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn unavailable(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            capability: capability.into(),
            reason: reason.into(),
        }
    }
}
