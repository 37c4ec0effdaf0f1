//! Operation-specific payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Known operation names.
pub mod names {
    pub const PROBE: &str = "probe";
    pub const WRITE_TEMP: &str = "write_temp";
    pub const LAUNCH: &str = "launch";
    pub const DELETE: &str = "delete";
    pub const READ: &str = "read";
    pub const READ_HEAD: &str = "read_head";
    pub const STAT: &str = "stat";
}

/// Probe response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Agent version.
    pub agent_version: String,
    /// Minimum protocol version supported.
    pub protocol_min: i32,
    /// Maximum protocol version supported.
    pub protocol_max: i32,
    /// Operating system family of the agent host (`windows`, `linux`, ...).
    pub os: String,
    /// Operations this agent understands.
    pub operations: Vec<String>,
    /// When the probe was answered.
    pub created_at: DateTime<Utc>,
}

/// Create a text file with a random name in a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteTempRequest {
    pub dir: String,
    pub prefix: String,
    pub suffix: String,
    pub contents: String,
}

/// Path of the created temporary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteTempResponse {
    pub path: String,
}

/// Run a process to completion on the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Environment entries layered over the agent's own environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    pub cwd: String,
}

/// Exit status of a launched process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchResponse {
    /// Exit code; -1 when the process was terminated by a signal.
    pub exit_code: i32,
}

/// Delete a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
}

/// Whether a file was removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// False when the file was already gone.
    pub deleted: bool,
}

/// Read a whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadRequest {
    pub path: String,
}

/// File contents. Text is lossily decoded as UTF-8.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    pub contents: String,
}

/// Read the first lines of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadHeadRequest {
    pub path: String,
    pub lines: usize,
}

/// The requested lines joined without separators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadHeadResponse {
    pub head: String,
}

/// Inspect a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRequest {
    pub path: String,
}

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// Stat result; `kind` is absent when the path does not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
}
