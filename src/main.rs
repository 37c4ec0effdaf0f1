//! OpenMETA test bench step CLI
//!
//! Entry point for the `openmeta-testbench` command-line tool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use openmeta_testbench::channel::{Channel, LocalChannel, RemoteChannel, SshConfig};
use openmeta_testbench::config::{EffectiveConfig, REPO_CONFIG_PATH};
use openmeta_testbench::observability::init_tracing;
use openmeta_testbench::step::ConsoleLog;
use openmeta_testbench::{
    BuildStep, FormValidation, RunContext, StepDescriptor, ToolchainLocator, Workspace,
};

#[derive(Parser)]
#[command(name = "openmeta-testbench")]
#[command(about = "Run OpenMETA model test benches as a build step", version)]
struct Cli {
    /// Debug-level diagnostics on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test benches and record their results
    Run {
        #[command(flatten)]
        step: StepArgs,

        /// Print the execution outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the generated script without running it
    Script {
        #[command(flatten)]
        step: StepArgs,
    },

    /// Run the form validators
    Check {
        #[command(subcommand)]
        field: CheckCommands,
    },

    /// Resolve the toolchain install directory on this machine
    Toolchain {
        #[command(flatten)]
        step: StepArgs,
    },

    /// Print the effective configuration and where it came from
    Config {
        #[command(flatten)]
        step: StepArgs,
    },

    /// Print step metadata
    Describe,
}

#[derive(Subcommand)]
enum CheckCommands {
    /// Check a model path against the workspace
    Model {
        value: String,

        #[arg(long, short = 'w', default_value = ".")]
        workspace: PathBuf,

        /// Check against the configured remote agent instead of this machine
        #[arg(long)]
        remote: bool,

        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Check a Max Configs value
    MaxConfigs { value: String },
}

#[derive(Args)]
struct StepArgs {
    /// Workspace directory on the node that runs the step
    #[arg(long, short = 'w', default_value = ".")]
    workspace: PathBuf,

    /// Repo config file (default: <workspace>/.openmeta/testbench.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Model file path
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Comma-separated exclusion patterns
    #[arg(long, short = 'e')]
    exclude: Option<String>,

    /// Advisory limit; a non-numeric value is warned about and ignored
    #[arg(long)]
    max_configs: Option<String>,

    /// Name of the XML results file
    #[arg(long)]
    results_file: Option<String>,

    /// Run on this agent host over SSH
    #[arg(long)]
    agent_host: Option<String>,
}

impl StepArgs {
    fn cli_overrides(&self) -> serde_json::Value {
        let mut step = serde_json::Map::new();
        if let Some(ref model) = self.model {
            step.insert("model_name".into(), model.clone().into());
        }
        if let Some(ref exclude) = self.exclude {
            step.insert("exclude_patterns".into(), exclude.clone().into());
        }
        if let Some(ref max) = self.max_configs {
            step.insert("max_configs".into(), max.clone().into());
        }
        if let Some(ref results) = self.results_file {
            step.insert("results_file".into(), results.clone().into());
        }

        let mut overrides = serde_json::json!({ "step": step });
        if let Some(ref host) = self.agent_host {
            overrides["agent"] = serde_json::json!({ "host": host });
        }
        overrides
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { step, json } => run_step(&step, json),
        Commands::Script { step } => run_script(&step),
        Commands::Check { field } => match field {
            CheckCommands::Model {
                value,
                workspace,
                remote,
                config,
            } => run_check_model(&value, &workspace, remote, config),
            CheckCommands::MaxConfigs { value } => {
                report_validation(StepDescriptor::new().check_max_configs(&value))
            }
        },
        Commands::Toolchain { step } => run_toolchain(&step),
        Commands::Config { step } => run_config(&step),
        Commands::Describe => run_describe(),
    }
}

fn load_config(
    workspace: &Path,
    config_path: Option<PathBuf>,
    overrides: Option<serde_json::Value>,
) -> EffectiveConfig {
    let repo_path = config_path.unwrap_or_else(|| workspace.join(REPO_CONFIG_PATH));
    let host_path = std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config/openmeta/testbench.toml"));

    match EffectiveConfig::build(host_path.as_deref(), Some(&repo_path), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(2);
        }
    }
}

fn open_channel(config: &EffectiveConfig) -> Box<dyn Channel> {
    match &config.config.agent {
        Some(agent) => Box::new(RemoteChannel::ssh(&SshConfig::from(agent))),
        None => Box::new(LocalChannel::new()),
    }
}

fn run_step(args: &StepArgs, json_output: bool) {
    let effective = load_config(&args.workspace, args.config.clone(), Some(args.cli_overrides()));
    let step = StepDescriptor::new().new_step(&effective.config);

    let channel = open_channel(&effective);
    let mut env: BTreeMap<String, String> = effective.config.env.clone();
    env.insert("WORKSPACE".to_string(), args.workspace.display().to_string());

    let mut log = ConsoleLog;
    let mut ctx = RunContext::new(channel.as_ref(), &mut log, args.workspace.clone()).with_env(env);
    let outcome = step.perform(&mut ctx);
    drop(ctx);

    if json_output {
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing outcome: {}", e);
                process::exit(2);
            }
        }
    }
    println!("Finished: {}", outcome.verdict);
    process::exit(outcome.verdict.exit_code());
}

fn run_script(args: &StepArgs) {
    let effective = load_config(&args.workspace, args.config.clone(), Some(args.cli_overrides()));
    let step = StepDescriptor::new().new_step(&effective.config);
    print!("{}", step.generate(&args.workspace).contents);
}

fn run_check_model(value: &str, workspace: &Path, remote: bool, config_path: Option<PathBuf>) {
    let channel: Box<dyn Channel> = if remote {
        let effective = load_config(workspace, config_path, None);
        match &effective.config.agent {
            Some(_) => open_channel(&effective),
            None => {
                eprintln!("--remote needs an [agent] section in the configuration");
                process::exit(2);
            }
        }
    } else {
        Box::new(LocalChannel::new())
    };

    let ws = Workspace::new(channel.as_ref(), workspace);
    report_validation(StepDescriptor::new().check_model_name(value, Some(ws)));
}

fn report_validation(result: FormValidation) {
    match result {
        FormValidation::Ok => println!("ok"),
        FormValidation::Warning(message) => println!("warning: {}", message),
        FormValidation::Error(message) => {
            println!("error: {}", message);
            process::exit(1);
        }
    }
}

fn run_toolchain(args: &StepArgs) {
    let effective = load_config(&args.workspace, args.config.clone(), None);
    let locator = ToolchainLocator::from_settings(&effective.config.toolchain);
    match locator.resolve_local() {
        Ok(path) => println!("{}", path),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn run_config(args: &StepArgs) {
    let effective = load_config(&args.workspace, args.config.clone(), Some(args.cli_overrides()));
    match effective.to_redacted_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(2);
        }
    }
}

fn run_describe() {
    let descriptor = StepDescriptor::new();
    println!("{} ({})", descriptor.display_name, descriptor.symbol);
    println!("  Fields: model_name (required), exclude_patterns, max_configs");
    println!("  Applicable to all job types: {}", descriptor.is_applicable());
}
