//! Error types for the agent protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned in RPC error responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version is outside the supported range.
    UnsupportedProtocol,
    /// Unknown operation requested.
    UnknownOperation,
    /// The referenced path does not exist on the agent.
    NotFound,
    /// A filesystem operation failed on the agent.
    IoFailed,
    /// The process could not be started.
    SpawnFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::UnknownOperation => write!(f, "UNKNOWN_OPERATION"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::IoFailed => write!(f, "IO_FAILED"),
            Self::SpawnFailed => write!(f, "SPAWN_FAILED"),
        }
    }
}

/// RPC error response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code from the registry.
    pub code: ErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Create a new RPC error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new RPC error with additional data.
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(version: i32, min: i32, max: i32) -> Self {
        Self::with_data(
            ErrorCode::UnsupportedProtocol,
            format!("protocol_version {} is outside supported range [{}, {}]", version, min, max),
            serde_json::json!({
                "requested": version,
                "min": min,
                "max": max
            }),
        )
    }

    /// Create an UNKNOWN_OPERATION error.
    pub fn unknown_operation(op: &str) -> Self {
        Self::with_data(
            ErrorCode::UnknownOperation,
            format!("unknown operation: {}", op),
            serde_json::json!({ "op": op }),
        )
    }

    /// Create a NOT_FOUND error for a path on the agent.
    pub fn not_found(path: &str) -> Self {
        Self::with_data(
            ErrorCode::NotFound,
            format!("no such file: {}", path),
            serde_json::json!({ "path": path }),
        )
    }

    /// Create an IO_FAILED error.
    pub fn io_failed(action: &str, path: &str, detail: impl fmt::Display) -> Self {
        Self::with_data(
            ErrorCode::IoFailed,
            format!("{} {} failed: {}", action, path, detail),
            serde_json::json!({ "action": action, "path": path }),
        )
    }

    /// Create a SPAWN_FAILED error.
    pub fn spawn_failed(program: &str, detail: impl fmt::Display) -> Self {
        Self::with_data(
            ErrorCode::SpawnFailed,
            format!("could not start {}: {}", program, detail),
            serde_json::json!({ "program": program }),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
