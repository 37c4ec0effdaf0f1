//! RPC response types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::RpcError;

/// RPC response envelope.
///
/// Every agent invocation ends with a single JSON response on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol version (echoed from request, or 0 for probe).
    pub protocol_version: i32,
    /// Request ID echoed from the request.
    pub request_id: String,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Success payload (present when ok=true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error details (present when ok=false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(protocol_version: i32, request_id: String, payload: serde_json::Value) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(protocol_version: i32, request_id: String, error: RpcError) -> Self {
        Self {
            protocol_version,
            request_id,
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Convert into the typed success payload, or the carried error.
    pub fn into_result<P: DeserializeOwned>(self) -> Result<P, RpcError> {
        if !self.ok {
            return Err(self
                .error
                .unwrap_or_else(|| RpcError::invalid_request("error response without error body")));
        }
        let payload = self.payload.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(payload)
            .map_err(|e| RpcError::invalid_request(format!("invalid response payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::ops::LaunchResponse;
    use serde_json::json;

    #[test]
    fn test_into_result_success() {
        let response = RpcResponse::success(1, "r".to_string(), json!({ "exit_code": 3 }));
        let launched: LaunchResponse = response.into_result().unwrap();
        assert_eq!(launched.exit_code, 3);
    }

    #[test]
    fn test_into_result_error() {
        let response = RpcResponse::error(1, "r".to_string(), RpcError::not_found("x.xml"));
        let err = response.into_result::<LaunchResponse>().unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_error_response_omits_payload() {
        let response = RpcResponse::error(1, "r".to_string(), RpcError::not_found("x.xml"));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("payload").is_none());
        assert_eq!(value["ok"], false);
    }
}
