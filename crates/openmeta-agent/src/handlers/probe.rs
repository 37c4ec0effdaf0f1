//! Probe operation handler.
//!
//! Answers with protocol_version 0 so a host can negotiate before it knows
//! which versions the agent speaks.

use chrono::Utc;
use openmeta_protocol::{ops::ProbeResponse, RpcError, AGENT_VERSION};

use super::to_payload;
use crate::config::AgentConfig;

/// Handle the probe operation.
pub fn handle(config: &AgentConfig) -> Result<serde_json::Value, RpcError> {
    to_payload(&ProbeResponse {
        agent_version: AGENT_VERSION.to_string(),
        protocol_min: config.protocol_min,
        protocol_max: config.protocol_max,
        os: std::env::consts::OS.to_string(),
        operations: config.operations.clone(),
        created_at: Utc::now(),
    })
}
