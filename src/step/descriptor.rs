//! Registration metadata and form validators for the step.

use serde::Serialize;

use super::TestBenchStep;
use crate::config::LaneConfig;
use crate::validation::{validate_max_configs, validate_model_path, FormValidation, Workspace};

/// Describes the test bench step to a host.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StepDescriptor {
    /// Name the step is invoked by in pipeline scripts.
    pub symbol: &'static str,
    pub display_name: &'static str,
}

impl StepDescriptor {
    pub const SYMBOL: &'static str = "openMetaTestBench";
    pub const DISPLAY_NAME: &'static str = "Run OpenMETA Test Benches";

    pub fn new() -> Self {
        Self {
            symbol: Self::SYMBOL,
            display_name: Self::DISPLAY_NAME,
        }
    }

    /// The step can be added to any kind of job.
    pub fn is_applicable(&self) -> bool {
        true
    }

    pub fn check_max_configs(&self, value: &str) -> FormValidation {
        validate_max_configs(value)
    }

    pub fn check_model_name(&self, value: &str, workspace: Option<Workspace<'_>>) -> FormValidation {
        validate_model_path(value, workspace)
    }

    /// Instantiate the step from configuration.
    pub fn new_step(&self, lane: &LaneConfig) -> TestBenchStep {
        TestBenchStep::from_lane_config(lane)
    }
}
