//! OpenMETA Test Bench Step
//!
//! A CI build step that runs OpenMETA model test benches: it generates a
//! batch script that locates the toolchain and invokes the test bench
//! runner against a model, runs it on a local or remote node, records the
//! JUnit XML results and classifies the run as SUCCESS, UNSTABLE or FAILURE.

pub mod archive;
pub mod channel;
pub mod config;
pub mod mock;
pub mod observability;
pub mod script;
pub mod step;
pub mod toolchain;
pub mod validation;

pub use archive::{ArchiveError, ArchiveSummary, JunitArchiver, ResultsArchiver};
pub use channel::{Channel, ChannelError, LaunchSpec, LocalChannel, RemoteChannel, SshConfig};
pub use config::{ConfigError, EffectiveConfig, LaneConfig, StepConfig, StepFields};
pub use mock::{MockArchiver, MockChannel};
pub use script::{CommandBuilder, GeneratedCommand};
pub use step::{
    BuildStep, CleanupStatus, ExecutionOutcome, MemoryLog, RunContext, RunLog, Stage,
    StepDescriptor, TestBenchStep, Verdict,
};
pub use toolchain::ToolchainLocator;
pub use validation::{FormValidation, Workspace};
