//! Typed view of the merged configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::step::StepFields;
use super::ConfigError;

/// Complete configuration of one step invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Step form fields.
    pub step: StepFields,
    /// Where the toolchain is installed.
    pub toolchain: ToolchainSettings,
    /// How the generated script is run.
    pub launch: LaunchSettings,
    /// Remote agent; `None` runs on this machine.
    pub agent: Option<AgentSettings>,
    /// Where recorded results are copied.
    pub archive: ArchiveSettings,
    /// Extra environment entries for the runner.
    pub env: BTreeMap<String, String>,
}

impl LaneConfig {
    /// Check cross-field constraints the types cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launch.interpreter.is_empty() {
            return Err(ConfigError::ValidationError(
                "launch.interpreter must name a program".to_string(),
            ));
        }
        if self.toolchain.registry_key.is_empty() && self.toolchain.install_path.is_none() {
            return Err(ConfigError::ValidationError(
                "toolchain needs either registry_key or install_path".to_string(),
            ));
        }
        if let Some(agent) = &self.agent {
            if agent.host.is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent.host must not be empty".to_string(),
                ));
            }
            if agent.port == 0 {
                return Err(ConfigError::ValidationError(
                    "agent.port must be in [1, 65535]".to_string(),
                ));
            }
            if agent.command.is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent.command must name the agent program".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Toolchain lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Registry key holding the install path.
    pub registry_key: String,
    /// Value name under the key.
    pub registry_value: String,
    /// Registry tool invoked by the script.
    pub registry_exe: String,
    /// Fixed install path, bypassing the registry.
    pub install_path: Option<String>,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            registry_key: "HKLM\\software\\META".to_string(),
            registry_value: "META_PATH".to_string(),
            registry_exe: "%SystemRoot%\\SysWoW64\\REG.exe".to_string(),
            install_path: None,
        }
    }
}

/// Script launch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Interpreter argv; the script path is appended.
    pub interpreter: Vec<String>,
    /// Directory for the temporary script, defaults to the workspace.
    pub script_dir: Option<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            interpreter: vec!["cmd.exe".to_string(), "/c".to_string()],
            script_dir: None,
        }
    }
}

/// SSH target running `openmeta-agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_path: Option<String>,
    pub connect_timeout_seconds: u32,
    /// Remote command line of the agent.
    pub command: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: "openmeta".to_string(),
            port: 22,
            key_path: None,
            connect_timeout_seconds: 30,
            command: vec!["openmeta-agent".to_string(), "rpc".to_string()],
        }
    }
}

/// Results archive settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Host directory receiving a copy of each recorded results file.
    pub dir: Option<String>,
}
