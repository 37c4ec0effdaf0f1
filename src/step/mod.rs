//! The test bench build step
//!
//! One execution walks through:
//!
//! ```text
//! NotStarted -> ScriptPrepared -> ProcessRun -> Archived
//! ```
//!
//! and always finishes with a cleanup phase that removes the temporary
//! script, whichever stage it stopped at. Errors never escape
//! [`BuildStep::perform`]: each one becomes a verdict plus a run log message.

mod descriptor;
mod log;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveSummary, JunitArchiver, ResultsArchiver};
use crate::channel::{Channel, LaunchSpec};
use crate::config::{LaneConfig, StepConfig};
use crate::script::{CommandBuilder, GeneratedCommand, SCRIPT_PREFIX, SCRIPT_SUFFIX};
use crate::toolchain::ToolchainLocator;
use crate::validation::{validate_max_configs, FormValidation};

pub use descriptor::StepDescriptor;
pub use log::{ConsoleLog, LogEntry, MemoryLog, RunLog};

/// Outcome classification surfaced to the CI run.
///
/// Ordered from best to worst; combining two verdicts keeps the worse one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    Unstable,
    Failure,
}

impl Verdict {
    pub fn combine(self, other: Verdict) -> Verdict {
        self.max(other)
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Unstable => 1,
            Verdict::Failure => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Success => "SUCCESS",
            Verdict::Unstable => "UNSTABLE",
            Verdict::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a step may touch during one run.
pub struct RunContext<'a> {
    channel: &'a dyn Channel,
    log: &'a mut dyn RunLog,
    workspace: PathBuf,
    env: BTreeMap<String, String>,
    result: Option<Verdict>,
}

impl<'a> RunContext<'a> {
    pub fn new(channel: &'a dyn Channel, log: &'a mut dyn RunLog, workspace: impl Into<PathBuf>) -> Self {
        Self {
            channel,
            log,
            workspace: workspace.into(),
            env: BTreeMap::new(),
            result: None,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn channel(&self) -> &'a dyn Channel {
        self.channel
    }

    pub fn log(&mut self) -> &mut dyn RunLog {
        &mut *self.log
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Record a verdict. A run's result can only get worse.
    pub fn set_result(&mut self, verdict: Verdict) {
        self.result = Some(match self.result {
            Some(current) => current.combine(verdict),
            None => verdict,
        });
    }

    /// Result so far; a run nobody marked is a success.
    pub fn result(&self) -> Verdict {
        self.result.unwrap_or(Verdict::Success)
    }
}

/// A unit of work the CI run executes.
pub trait BuildStep {
    fn perform(&self, ctx: &mut RunContext<'_>) -> ExecutionOutcome;
}

/// Furthest stage an execution reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    ScriptPrepared,
    ProcessRun,
    Archived,
}

/// What the cleanup phase did with the temporary script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    /// No script was created.
    NotNeeded,
    Deleted,
    /// Deletion failed after the channel was lost; not reported.
    Suppressed,
    /// Deletion failed and a warning was logged.
    Failed,
}

/// Result of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub verdict: Verdict,
    /// `None` when the process never ran to completion.
    pub exit_code: Option<i32>,
    pub results_artifact: PathBuf,
    pub stage: Stage,
    pub cleanup: CleanupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Default)]
struct Progress {
    script: Option<PathBuf>,
    exit_code: Option<i32>,
    launch_failed: bool,
    archive: Option<ArchiveSummary>,
    stage: Option<Stage>,
}

impl Progress {
    fn reach(&mut self, stage: Stage) {
        self.stage = Some(stage);
    }
}

/// Runs OpenMETA test benches against a model and records their results.
pub struct TestBenchStep {
    config: StepConfig,
    builder: CommandBuilder,
    interpreter: Vec<String>,
    script_dir: Option<PathBuf>,
    archiver: Box<dyn ResultsArchiver>,
}

impl TestBenchStep {
    pub fn new(config: StepConfig, locator: ToolchainLocator) -> Self {
        Self {
            config,
            builder: CommandBuilder::new(locator),
            interpreter: vec!["cmd.exe".to_string(), "/c".to_string()],
            script_dir: None,
            archiver: Box::new(JunitArchiver::new()),
        }
    }

    /// Build a step from merged configuration.
    pub fn from_lane_config(lane: &LaneConfig) -> Self {
        let config = StepConfig::from_fields(&lane.step);
        let archiver = match &lane.archive.dir {
            Some(dir) => JunitArchiver::with_archive_dir(dir),
            None => JunitArchiver::new(),
        };
        let mut step = Self::new(config, ToolchainLocator::from_settings(&lane.toolchain))
            .with_interpreter(lane.launch.interpreter.clone())
            .with_archiver(Box::new(archiver));
        step.script_dir = lane.launch.script_dir.as_ref().map(PathBuf::from);
        step
    }

    pub fn with_interpreter(mut self, interpreter: Vec<String>) -> Self {
        self.interpreter = interpreter;
        self
    }

    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    pub fn with_archiver(mut self, archiver: Box<dyn ResultsArchiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Script contents and working directory for a workspace.
    pub fn generate(&self, workspace: &Path) -> GeneratedCommand {
        GeneratedCommand::new(self.builder.build(&self.config), workspace)
    }

    fn execute(&self, ctx: &mut RunContext<'_>, progress: &mut Progress) {
        if let FormValidation::Error(message) = validate_max_configs(self.config.max_configs_field()) {
            ctx.log().warning(&format!(
                "{} (got '{}'), ignoring it",
                message,
                self.config.max_configs_field()
            ));
        }

        let command = self.generate(ctx.workspace());
        let script_dir = self
            .script_dir
            .clone()
            .unwrap_or_else(|| ctx.workspace().to_path_buf());
        let channel = ctx.channel();

        let script = match channel.create_text_temp_file(
            &script_dir,
            SCRIPT_PREFIX,
            SCRIPT_SUFFIX,
            &command.contents,
        ) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(dir = %script_dir.display(), error = %e, "script write failed");
                ctx.log().fatal_error(&format!("Could not write script file: {}", e));
                ctx.set_result(Verdict::Failure);
                return;
            }
        };
        progress.script = Some(script.clone());
        progress.reach(Stage::ScriptPrepared);

        let spec = LaunchSpec {
            argv: GeneratedCommand::argv(&self.interpreter, &script),
            env: ctx.env().clone(),
            cwd: command.working_dir,
        };
        let banner = format!("[{}] $ {}", spec.cwd.display(), spec.argv.join(" "));
        ctx.log().info(&banner);
        tracing::info!(channel = %channel.describe(), argv = ?spec.argv, "launching test bench runner");

        let exit_code = match channel.launch(&spec, &mut |stream, line| ctx.log().output(stream, line)) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "launch failed");
                progress.launch_failed = true;
                ctx.log().fatal_error(&format!("Command failed: {}", e));
                return;
            }
        };
        progress.exit_code = Some(exit_code);
        progress.reach(Stage::ProcessRun);

        if exit_code != 0 {
            ctx.log().info(&format!(
                "Test bench runner exited with code {}, marking the build UNSTABLE",
                exit_code
            ));
            ctx.set_result(Verdict::Unstable);
        }

        ctx.log().info("Recording test results");
        match self.archiver.archive(self.config.results_file(), ctx) {
            Ok(summary) => {
                ctx.log().info(&format!(
                    "Recorded {} tests: {} failures, {} errors, {} skipped",
                    summary.tests, summary.failures, summary.errors, summary.skipped
                ));
                ctx.set_result(summary.verdict());
                progress.archive = Some(summary);
                progress.reach(Stage::Archived);
            }
            // After a non-zero exit the run is already UNSTABLE and stays so.
            Err(e) if exit_code != 0 => {
                tracing::warn!(exit_code, error = %e, "no results after failed runner");
                ctx.log().fatal_error(&e.to_string());
            }
            Err(e) => {
                ctx.log().fatal_error(&e.to_string());
                ctx.set_result(Verdict::Failure);
            }
        }
    }

    fn cleanup(&self, ctx: &mut RunContext<'_>, progress: &Progress) -> CleanupStatus {
        let Some(script) = &progress.script else {
            return CleanupStatus::NotNeeded;
        };
        match ctx.channel().delete(script) {
            Ok(_) => CleanupStatus::Deleted,
            // The launch already failed and was reported; a lost channel
            // here is the same failure seen twice.
            Err(e) if progress.launch_failed && e.is_channel_closed() => {
                tracing::debug!(script = %script.display(), error = %e, "script deletion failed");
                CleanupStatus::Suppressed
            }
            Err(e) => {
                ctx.log()
                    .warning(&format!("Could not delete {}: {}", script.display(), e));
                CleanupStatus::Failed
            }
        }
    }
}

impl BuildStep for TestBenchStep {
    fn perform(&self, ctx: &mut RunContext<'_>) -> ExecutionOutcome {
        let started_at = Utc::now();
        let mut progress = Progress::default();

        self.execute(ctx, &mut progress);
        let cleanup = self.cleanup(ctx, &progress);

        ExecutionOutcome {
            verdict: ctx.result(),
            exit_code: progress.exit_code,
            results_artifact: ctx.workspace().join(self.config.results_file()),
            stage: progress.stage.unwrap_or(Stage::NotStarted),
            cleanup,
            archive: progress.archive,
            script_path: progress.script,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_combine_keeps_worse() {
        assert_eq!(Verdict::Success.combine(Verdict::Unstable), Verdict::Unstable);
        assert_eq!(Verdict::Failure.combine(Verdict::Success), Verdict::Failure);
        assert_eq!(Verdict::Unstable.combine(Verdict::Unstable), Verdict::Unstable);
    }

    #[test]
    fn test_verdict_exit_codes() {
        assert_eq!(Verdict::Success.exit_code(), 0);
        assert_eq!(Verdict::Unstable.exit_code(), 1);
        assert_eq!(Verdict::Failure.exit_code(), 2);
        assert_eq!(serde_json::to_string(&Verdict::Unstable).unwrap(), "\"UNSTABLE\"");
    }

    #[test]
    fn test_set_result_never_improves() {
        let channel = crate::channel::LocalChannel;
        let mut log = MemoryLog::new();
        let mut ctx = RunContext::new(&channel, &mut log, "/ws");
        assert_eq!(ctx.result(), Verdict::Success);
        ctx.set_result(Verdict::Unstable);
        ctx.set_result(Verdict::Success);
        assert_eq!(ctx.result(), Verdict::Unstable);
    }

    #[test]
    fn test_from_lane_config_keeps_bad_max_configs() {
        let mut lane = LaneConfig::default();
        lane.step.max_configs = "many".to_string();
        let step = TestBenchStep::from_lane_config(&lane);
        assert_eq!(step.config().max_configs_field(), "many");
        assert_eq!(step.config().max_configs(), None);
    }

    #[test]
    fn test_generate_uses_workspace_as_working_dir() {
        let step = TestBenchStep::from_lane_config(&LaneConfig::default());
        let command = step.generate(Path::new("/ws"));
        assert_eq!(command.working_dir, PathBuf::from("/ws"));
        assert!(command.contents.contains("RunTestBenches.py"));
    }
}
