//! Result envelope returned by `execute_tool`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Machine-readable error carried in a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable kind, see [`Error::kind`].
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorDetail {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one tool execution. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: EnvelopeStatus,
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ResultEnvelope {
    pub fn success(tool: impl Into<String>, result: Value) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            tool: tool.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, err: &Error) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            tool: tool.into(),
            result: None,
            error: Some(ErrorDetail::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    /// Error kind, if the execution failed.
    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let env = ResultEnvelope::success("search_code", json!({"hits": 2}));
        assert!(env.is_success());
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"status": "success", "tool": "search_code", "result": {"hits": 2}})
        );
    }

    #[test]
    fn test_failure_shape() {
        let env = ResultEnvelope::failure("search_code", &Error::validation("missing 'query'"));
        assert!(!env.is_success());
        assert_eq!(env.error_kind(), Some("validation_error"));

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["kind"], "validation_error");
        assert!(value.get("result").is_none());
    }
}
