//! Test bench script generation
//!
//! Turns a [`StepConfig`] into the batch script that runs the OpenMETA
//! test bench runner:
//!
//! ```text
//! <toolchain preamble>
//! "%META_PATH%bin\Python27\Scripts\python.exe" "%META_PATH%bin\RunTestBenches.py" "<model>" -- -v --with-xunit --xunit-file=<results>  -e <p1> -e <p2>
//! ```
//!
//! Lines end with CRLF. The model path is quoted but otherwise inserted
//! byte-for-byte.

use std::path::{Path, PathBuf};

use crate::config::StepConfig;
use crate::toolchain::{ToolchainLocator, TOOLCHAIN_VAR};

/// Prefix of the temporary script file name.
pub const SCRIPT_PREFIX: &str = "openmeta";

/// Extension of the temporary script file.
pub const SCRIPT_SUFFIX: &str = ".cmd";

/// Flag that precedes each exclusion pattern.
pub const EXCLUDE_FLAG: &str = "-e";

/// Verbosity flag passed through to the test runner.
pub const VERBOSE_FLAG: &str = "-v";

/// Python interpreter shipped with the toolchain, relative to its root.
const PYTHON_EXE: &str = "bin\\Python27\\Scripts\\python.exe";

/// Runner entry point, relative to the toolchain root.
const RUNNER_SCRIPT: &str = "bin\\RunTestBenches.py";

/// Builds script contents for a step.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    locator: ToolchainLocator,
}

impl CommandBuilder {
    pub fn new(locator: ToolchainLocator) -> Self {
        Self { locator }
    }

    /// Full script text, CRLF line endings.
    pub fn build(&self, config: &StepConfig) -> String {
        format!(
            "{}\r\n{}\r\n",
            self.locator.script_preamble(),
            runner_command(config)
        )
    }
}

/// The runner invocation line on its own.
pub fn runner_command(config: &StepConfig) -> String {
    let excludes: String = config
        .exclude_patterns()
        .iter()
        .map(|pattern| format!(" {} {}", EXCLUDE_FLAG, pattern))
        .collect();

    format!(
        "\"%{var}%{python}\" \"%{var}%{runner}\" \"{model}\" -- {verbose} --with-xunit --xunit-file={results} {excludes}",
        var = TOOLCHAIN_VAR,
        python = PYTHON_EXE,
        runner = RUNNER_SCRIPT,
        model = config.model_path(),
        verbose = VERBOSE_FLAG,
        results = config.results_file(),
        excludes = excludes,
    )
}

/// A script ready to run: its contents and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCommand {
    pub contents: String,
    pub working_dir: PathBuf,
}

impl GeneratedCommand {
    pub fn new(contents: String, working_dir: &Path) -> Self {
        Self {
            contents,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Interpreter argv followed by the script path.
    pub fn argv(interpreter: &[String], script: &Path) -> Vec<String> {
        let mut argv = interpreter.to_vec();
        argv.push(script.to_string_lossy().to_string());
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StepFields, ToolchainSettings};

    fn builder() -> CommandBuilder {
        CommandBuilder::new(ToolchainLocator::from_settings(&ToolchainSettings::default()))
    }

    fn config(model: &str, excludes: &str) -> StepConfig {
        StepConfig::from_fields(&StepFields {
            model_name: model.to_string(),
            exclude_patterns: excludes.to_string(),
            ..StepFields::default()
        })
    }

    #[test]
    fn test_no_excludes_emits_no_flag() {
        let line = runner_command(&config("model.xme", ""));
        assert!(line.contains("\"model.xme\""));
        assert!(!line.contains(" -e "));
        assert!(line.ends_with("--xunit-file=openmeta-testbenches-result.xml "));
    }

    #[test]
    fn test_excludes_in_order() {
        let line = runner_command(&config("m.xme", "foo,bar"));
        assert!(line.ends_with("--xunit-file=openmeta-testbenches-result.xml  -e foo -e bar"));
    }

    #[test]
    fn test_script_has_two_crlf_lines() {
        let script = builder().build(&config("model.xme", ""));
        let lines: Vec<&str> = script.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("FOR /F"));
        assert!(lines[1].starts_with("\"%META_PATH%bin\\Python27\\Scripts\\python.exe\""));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_custom_results_file() {
        let cfg = config("m.xme", "").with_results_file("tb.xml");
        assert!(runner_command(&cfg).contains("--xunit-file=tb.xml"));
    }

    #[test]
    fn test_argv_appends_script() {
        let interpreter = vec!["cmd.exe".to_string(), "/c".to_string()];
        let argv = GeneratedCommand::argv(&interpreter, Path::new("ws/openmeta1.cmd"));
        assert_eq!(argv, ["cmd.exe", "/c", "ws/openmeta1.cmd"]);
    }
}
