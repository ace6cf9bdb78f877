//! Response envelopes returned by every tool.
//!
//! Success: `{"success": true, "timestamp": ..., <payload fields>}`.
//! Failure: `{"success": false, "timestamp": ..., "error": {code, message, details}}`.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use xpr_lending_core::EngineError;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ChainQueryError,
    InvalidInput,
    Timeout,
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
        }
    }

    pub fn timeout(tool: &str, deadline: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("{tool} did not finish within {}ms", deadline.as_millis()),
            json!({ "tool": tool, "deadline_ms": deadline.as_millis() as u64 }),
        )
    }

    pub fn internal(tool: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message, json!({ "tool": tool }))
    }
}

impl From<&EngineError> for ToolError {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::ChainQuery {
                contract,
                table,
                source,
            } => Self::new(
                ErrorCode::ChainQueryError,
                err.to_string(),
                json!({
                    "contract": contract,
                    "table": table,
                    "cause": source.to_string(),
                }),
            ),
            EngineError::InvalidInput(reason) => Self::new(
                ErrorCode::InvalidInput,
                err.to_string(),
                json!({ "reason": reason }),
            ),
        }
    }
}

/// Tool result with its envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse<T> {
    pub success: bool,
    pub timestamp: String,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl<T> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            timestamp: timestamp(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ToolError) -> Self {
        Self {
            success: false,
            timestamp: timestamp(),
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T: Serialize> ToolResponse<T> {
    /// Envelope as a JSON value. Serialization failures become an
    /// `INTERNAL_ERROR` envelope.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            json!({
                "success": false,
                "timestamp": timestamp(),
                "error": ToolError::internal("serialize", e.to_string()),
            })
        })
    }
}

/// Current time, ISO-8601 in UTC with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
