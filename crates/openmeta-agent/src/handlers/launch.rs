//! Launch operation handler.
//!
//! Output lines are handed to the caller's sink as they are read; the
//! response only carries the exit code.

use std::path::PathBuf;

use openmeta_protocol::ops::{LaunchRequest, LaunchResponse};
use openmeta_protocol::{OutputStream, RpcError, RpcRequest};
use openmeta_testbench::{Channel, LaunchSpec};

use super::{channel, to_payload};

/// Handle the launch operation.
pub fn handle(
    request: &RpcRequest,
    sink: &mut dyn FnMut(OutputStream, &str),
) -> Result<serde_json::Value, RpcError> {
    let req: LaunchRequest = request.decode()?;
    let program = req
        .argv
        .first()
        .cloned()
        .ok_or_else(|| RpcError::invalid_request("launch argv is empty"))?;

    let spec = LaunchSpec {
        argv: req.argv,
        env: req.env,
        cwd: PathBuf::from(req.cwd),
    };
    tracing::info!(argv = ?spec.argv, cwd = %spec.cwd.display(), "launching");

    let exit_code = channel()
        .launch(&spec, sink)
        .map_err(|e| RpcError::spawn_failed(&program, e))?;
    tracing::info!(exit_code, "process exited");

    to_payload(&LaunchResponse { exit_code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_protocol::ops::names;
    use openmeta_protocol::ErrorCode;
    use serde_json::json;

    fn request(payload: serde_json::Value) -> RpcRequest {
        RpcRequest {
            protocol_version: 1,
            op: names::LAUNCH.to_string(),
            request_id: "req-launch".to_string(),
            payload,
        }
    }

    #[test]
    fn test_empty_argv_rejected() {
        let err = handle(&request(json!({ "argv": [], "cwd": "." })), &mut |_, _| {}).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_missing_program_is_spawn_failed() {
        let err = handle(
            &request(json!({ "argv": ["no-such-runner-openmeta"], "cwd": "." })),
            &mut |_, _| {},
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SpawnFailed);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_reaches_sink_and_exit_code_returned() {
        let mut lines = Vec::new();
        let payload = handle(
            &request(json!({
                "argv": ["sh", "-c", "echo \"$GREETING\"; exit 3"],
                "env": { "GREETING": "hello" },
                "cwd": ".",
            })),
            &mut |stream, line| lines.push((stream, line.to_string())),
        )
        .unwrap();
        assert_eq!(payload, json!({ "exit_code": 3 }));
        assert_eq!(lines, vec![(OutputStream::Stdout, "hello".to_string())]);
    }
}
