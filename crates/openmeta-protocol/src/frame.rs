//! Stdout framing between agent and host.
//!
//! The agent writes one JSON object per line. Output lines from a launched
//! process are forwarded as `output` frames while it runs; the invocation
//! always ends with exactly one `response` frame.

use serde::{Deserialize, Serialize};

use crate::response::RpcResponse;

/// Which stream of the child process a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of agent stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// A line of process output, forwarded as soon as it is read.
    Output { stream: OutputStream, line: String },
    /// Terminal frame carrying the operation result.
    Response(RpcResponse),
}

impl Frame {
    /// Encode as a single line of JSON (without the trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a single line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_frame_shape() {
        let frame = Frame::Output {
            stream: OutputStream::Stdout,
            line: "Ran 3 tests".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_line().unwrap()).unwrap();
        assert_eq!(value, json!({ "frame": "output", "stream": "stdout", "line": "Ran 3 tests" }));
    }

    #[test]
    fn test_response_frame_is_flattened() {
        let line = r#"{"frame":"response","protocol_version":1,"request_id":"r1","ok":true,"payload":{"exit_code":0}}"#;
        match Frame::from_line(line).unwrap() {
            Frame::Response(response) => {
                assert!(response.ok);
                assert_eq!(response.request_id, "r1");
            }
            other => panic!("expected response frame, got {:?}", other),
        }
    }
}
