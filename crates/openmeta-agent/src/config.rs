//! Agent configuration.

use openmeta_protocol::{ops::names, PROTOCOL_MAX, PROTOCOL_MIN};

/// Agent configuration settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Minimum supported protocol version.
    pub protocol_min: i32,
    /// Maximum supported protocol version.
    pub protocol_max: i32,
    /// Operations advertised by probe.
    pub operations: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            protocol_min: PROTOCOL_MIN,
            protocol_max: PROTOCOL_MAX,
            operations: [
                names::PROBE,
                names::WRITE_TEMP,
                names::LAUNCH,
                names::DELETE,
                names::READ,
                names::READ_HEAD,
                names::STAT,
            ]
            .iter()
            .map(|op| op.to_string())
            .collect(),
        }
    }
}
