//! RPC request types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// RPC request envelope.
///
/// Every agent invocation accepts a single JSON request on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version. For probe requests, this MUST be 0.
    pub protocol_version: i32,
    /// Operation name.
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    pub payload: serde_json::Value,
}

impl RpcRequest {
    /// Build a request from a typed payload.
    pub fn new<P: Serialize>(
        protocol_version: i32,
        op: &str,
        request_id: impl Into<String>,
        payload: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            protocol_version,
            op: op.to_string(),
            request_id: request_id.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decode the payload into the operation's request type.
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, RpcError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            RpcError::invalid_request(format!("invalid {} payload: {}", self.op, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{names, DeleteRequest};
    use serde_json::json;

    #[test]
    fn test_decode_typed_payload() {
        let request = RpcRequest {
            protocol_version: 1,
            op: names::DELETE.to_string(),
            request_id: "req-1".to_string(),
            payload: json!({ "path": "C:\\ws\\openmeta123.cmd" }),
        };
        let payload: DeleteRequest = request.decode().unwrap();
        assert_eq!(payload.path, "C:\\ws\\openmeta123.cmd");
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let request = RpcRequest {
            protocol_version: 1,
            op: names::DELETE.to_string(),
            request_id: "req-2".to_string(),
            payload: json!({}),
        };
        let err = request.decode::<DeleteRequest>().unwrap_err();
        assert!(err.message.contains("invalid delete payload"));
    }
}
