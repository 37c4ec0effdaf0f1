//! Mock results archiver.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::archive::{ArchiveError, ArchiveSummary, ResultsArchiver};
use crate::step::RunContext;

/// Archiver with a fixed answer.
#[derive(Debug, Clone)]
pub struct MockArchiver {
    summary: Option<ArchiveSummary>,
    calls: Arc<AtomicU32>,
}

impl MockArchiver {
    /// Always records a clean report with `tests` passing tests.
    pub fn passing(tests: u64) -> Self {
        Self {
            summary: Some(ArchiveSummary {
                tests,
                ..ArchiveSummary::default()
            }),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Always records the given counters.
    pub fn with_summary(summary: ArchiveSummary) -> Self {
        Self {
            summary: Some(summary),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Never finds a report.
    pub fn missing() -> Self {
        Self {
            summary: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared counter, readable after the archiver is moved into a step.
    pub fn call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

impl ResultsArchiver for MockArchiver {
    fn archive(
        &self,
        results_file: &str,
        _ctx: &mut RunContext<'_>,
    ) -> Result<ArchiveSummary, ArchiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summary
            .ok_or_else(|| ArchiveError::NoReports(results_file.to_string()))
    }
}
