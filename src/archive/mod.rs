//! Results archiving
//!
//! After the runner exits, its JUnit-style XML report is recorded. Only the
//! counters on the root element are read; anything deeper belongs to the
//! tools that consume the archived copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::channel::ChannelError;
use crate::step::{RunContext, Verdict};

/// Archiving errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("No test report files were found at {0}. Configuration error?")]
    NoReports(String),

    #[error("Test report {path} is not a JUnit XML report")]
    NotJunit { path: String },

    #[error("Could not read test report: {0}")]
    Channel(#[from] ChannelError),

    #[error("Could not copy test report to {path}: {source}")]
    Copy {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Counters from a recorded report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl ArchiveSummary {
    /// Verdict the recorded results call for on their own.
    pub fn verdict(&self) -> Verdict {
        if self.failures > 0 || self.errors > 0 {
            Verdict::Unstable
        } else {
            Verdict::Success
        }
    }
}

/// Records a results file produced in the workspace.
pub trait ResultsArchiver {
    fn archive(
        &self,
        results_file: &str,
        ctx: &mut RunContext<'_>,
    ) -> Result<ArchiveSummary, ArchiveError>;
}

/// Reads a JUnit XML report through the run's channel.
#[derive(Debug, Clone, Default)]
pub struct JunitArchiver {
    archive_dir: Option<PathBuf>,
}

impl JunitArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every recorded report into `dir`.
    pub fn with_archive_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: Some(dir.into()),
        }
    }

    fn store_copy(&self, results_file: &str, contents: &str) -> Result<(), ArchiveError> {
        let Some(dir) = &self.archive_dir else {
            return Ok(());
        };
        let name = Path::new(results_file)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| results_file.into());
        let target = dir.join(name);
        fs::create_dir_all(dir)
            .and_then(|_| fs::write(&target, contents))
            .map_err(|source| ArchiveError::Copy {
                path: target.display().to_string(),
                source,
            })
    }
}

impl ResultsArchiver for JunitArchiver {
    fn archive(
        &self,
        results_file: &str,
        ctx: &mut RunContext<'_>,
    ) -> Result<ArchiveSummary, ArchiveError> {
        let path = ctx.workspace().join(results_file);
        let contents = match ctx.channel().read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.is_not_found() => return Err(ArchiveError::NoReports(results_file.to_string())),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Err(ArchiveError::NoReports(results_file.to_string()));
        }

        let summary = parse_summary(&contents).ok_or_else(|| ArchiveError::NotJunit {
            path: results_file.to_string(),
        })?;
        self.store_copy(results_file, &contents)?;

        tracing::debug!(
            results_file,
            tests = summary.tests,
            failures = summary.failures,
            errors = summary.errors,
            "recorded test results"
        );
        Ok(summary)
    }
}

/// Read the counters of the root `<testsuite>` or `<testsuites>` element.
///
/// A `<testsuites>` root without counters is summed over its suites.
pub fn parse_summary(xml: &str) -> Option<ArchiveSummary> {
    let caps = cached(&ROOT_RE, r"<(testsuites?)\b([^>]*)>")?.captures(xml)?;
    let mut summary = summary_from_attrs(caps.get(2)?.as_str())?;

    if &caps[1] == "testsuites" && summary == ArchiveSummary::default() {
        let suite = cached(&SUITE_RE, r"<testsuite\b([^>]*)>")?;
        for caps in suite.captures_iter(xml) {
            let s = summary_from_attrs(&caps[1])?;
            summary.tests += s.tests;
            summary.failures += s.failures;
            summary.errors += s.errors;
            summary.skipped += s.skipped;
        }
    }
    Some(summary)
}

static ROOT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static SUITE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static ATTR_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Scan an element's attributes once. Non-numeric counters read as zero.
fn summary_from_attrs(attrs: &str) -> Option<ArchiveSummary> {
    let re = cached(&ATTR_RE, r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?;
    let mut summary = ArchiveSummary::default();
    for caps in re.captures_iter(attrs) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .and_then(|v| v.as_str().parse::<u64>().ok())
            .unwrap_or(0);
        match &caps[1] {
            "tests" => summary.tests = value,
            "failures" => summary.failures = value,
            "errors" => summary.errors = value,
            // nose writes `skip`, most other producers `skipped`
            "skipped" | "skip" => summary.skipped = summary.skipped.max(value),
            _ => {}
        }
    }
    Some(summary)
}
