//! Operation handlers for the agent RPC.
//!
//! Each handler decodes its payload, performs the operation through
//! [`LocalChannel`] and returns the response payload as JSON.

pub mod files;
pub mod launch;
pub mod probe;

use std::path::Path;

use openmeta_protocol::RpcError;
use openmeta_testbench::channel::ChannelError;
use openmeta_testbench::LocalChannel;
use serde::Serialize;

/// The node the agent runs on.
pub(crate) fn channel() -> LocalChannel {
    LocalChannel::new()
}

/// Map a channel failure on `path` to the protocol error registry.
pub(crate) fn channel_error(action: &str, path: &Path, err: ChannelError) -> RpcError {
    let path = path.to_string_lossy();
    if err.is_not_found() {
        RpcError::not_found(&path)
    } else {
        RpcError::io_failed(action, &path, err)
    }
}

pub(crate) fn to_payload<T: Serialize>(response: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(response)
        .map_err(|e| RpcError::invalid_request(format!("failed to serialize response: {}", e)))
}
