//! Run log sinks
//!
//! The run log is what a user reads in the CI console. It is passed into
//! the step rather than reached through global state; diagnostic logging
//! goes to `tracing` separately.

use std::io::{self, Write};

use serde::Serialize;

use crate::channel::OutputStream;

/// Console of a single run.
pub trait RunLog {
    /// Progress message from the step itself.
    fn info(&mut self, message: &str);

    /// A line of runner output, forwarded as it is produced.
    fn output(&mut self, stream: OutputStream, line: &str);

    /// Non-fatal problem.
    fn warning(&mut self, message: &str);

    /// Problem that ended a stage of the run.
    fn fatal_error(&mut self, message: &str);
}

/// Writes the run log to stdout, problems to stderr.
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl RunLog for ConsoleLog {
    fn info(&mut self, message: &str) {
        println!("{}", message);
    }

    fn output(&mut self, _stream: OutputStream, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }

    fn warning(&mut self, message: &str) {
        eprintln!("WARNING: {}", message);
    }

    fn fatal_error(&mut self, message: &str) {
        eprintln!("ERROR: {}", message);
    }
}

/// One recorded run log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum LogEntry {
    Info(String),
    Output(String),
    Warning(String),
    Fatal(String),
}

/// Keeps the run log in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Warning(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn fatals(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Fatal(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn output_lines(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                LogEntry::Output(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True if any entry contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| match e {
            LogEntry::Info(m) | LogEntry::Output(m) | LogEntry::Warning(m) | LogEntry::Fatal(m) => {
                m.contains(needle)
            }
        })
    }
}

impl RunLog for MemoryLog {
    fn info(&mut self, message: &str) {
        self.entries.push(LogEntry::Info(message.to_string()));
    }

    fn output(&mut self, _stream: OutputStream, line: &str) {
        self.entries.push(LogEntry::Output(line.to_string()));
    }

    fn warning(&mut self, message: &str) {
        self.entries.push(LogEntry::Warning(message.to_string()));
    }

    fn fatal_error(&mut self, message: &str) {
        self.entries.push(LogEntry::Fatal(message.to_string()));
    }
}
