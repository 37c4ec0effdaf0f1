//! Configuration for the test bench step
//!
//! Step fields come from the host form (or the `[step]` table of a config
//! file). Everything else is layered:
//! 1. Built-in defaults
//! 2. Host/user config (~/.config/openmeta/testbench.toml)
//! 3. Repo config (.openmeta/testbench.toml)
//! 4. CLI flags

mod effective;
mod lane;
mod step;

pub use effective::{deep_merge, merge_layers, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use lane::{AgentSettings, ArchiveSettings, LaneConfig, LaunchSettings, ToolchainSettings};
pub use step::{parse_max_configs, split_patterns, StepConfig, StepFields, DEFAULT_RESULTS_FILE};

/// Default location of the repo config, relative to the workspace.
pub const REPO_CONFIG_PATH: &str = ".openmeta/testbench.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Max Configs must be a number, got '{0}'")]
    InvalidMaxConfigs(String),
}
