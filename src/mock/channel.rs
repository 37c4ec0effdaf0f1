//! Mock channel with failure injection.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::channel::{Channel, ChannelError, EntryKind, LaunchSpec, OutputSink, OutputStream};

/// Channel operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    WriteTemp,
    Launch,
    Delete,
    Read,
    ReadHead,
    Stat,
}

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFault {
    /// Plain I/O failure (permission denied).
    Io,
    /// The connection to the node is gone.
    Closed,
}

impl ChannelFault {
    fn to_error(self, op: MockOp) -> ChannelError {
        match self {
            ChannelFault::Io => ChannelError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected failure in {:?}", op),
            )),
            ChannelFault::Closed => ChannelError::Closed(format!("injected disconnect in {:?}", op)),
        }
    }
}

/// What the launched process does.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcess {
    pub exit_code: i32,
    pub output: Vec<(OutputStream, String)>,
    /// Files the process leaves behind, relative to its working directory.
    pub writes: Vec<(String, String)>,
}

impl ScriptedProcess {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, line: impl Into<String>) -> Self {
        self.output.push((OutputStream::Stdout, line.into()));
        self
    }

    pub fn writing(mut self, relative: impl Into<String>, contents: impl Into<String>) -> Self {
        self.writes.push((relative.into(), contents.into()));
        self
    }
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<PathBuf, String>,
    dirs: Vec<PathBuf>,
    faults: HashMap<MockOp, ChannelFault>,
    calls: HashMap<MockOp, u32>,
    launches: Vec<LaunchSpec>,
    process: ScriptedProcess,
    next_temp: u32,
}

/// In-memory node.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<State>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.lock().files.insert(path.into(), contents.into());
        self
    }

    /// Add a directory.
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        self.lock().dirs.push(path.into());
        self
    }

    /// Set what a launch does.
    pub fn with_process(self, process: ScriptedProcess) -> Self {
        self.lock().process = process;
        self
    }

    /// Make every call of `op` fail.
    pub fn fail(self, op: MockOp, fault: ChannelFault) -> Self {
        self.lock().faults.insert(op, fault);
        self
    }

    pub fn calls(&self, op: MockOp) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        self.lock().launches.clone()
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.lock().files.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test may poison the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, op: MockOp) -> Result<(), ChannelError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.faults.get(&op) {
            Some(fault) => Err(fault.to_error(op)),
            None => Ok(()),
        }
    }

    fn not_found(path: &Path) -> ChannelError {
        ChannelError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}

impl Channel for MockChannel {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    fn create_text_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &str,
    ) -> Result<PathBuf, ChannelError> {
        self.enter(MockOp::WriteTemp)?;
        let mut state = self.lock();
        state.next_temp += 1;
        let path = dir.join(format!("{}{:06}{}", prefix, state.next_temp, suffix));
        state.files.insert(path.clone(), contents.to_string());
        Ok(path)
    }

    fn launch(&self, spec: &LaunchSpec, sink: &mut OutputSink<'_>) -> Result<i32, ChannelError> {
        self.enter(MockOp::Launch)?;
        let process = {
            let mut state = self.lock();
            state.launches.push(spec.clone());
            let process = state.process.clone();
            for (relative, contents) in &process.writes {
                state.files.insert(spec.cwd.join(relative), contents.clone());
            }
            process
        };
        for (stream, line) in &process.output {
            sink(*stream, line);
        }
        Ok(process.exit_code)
    }

    fn delete(&self, path: &Path) -> Result<bool, ChannelError> {
        self.enter(MockOp::Delete)?;
        Ok(self.lock().files.remove(path).is_some())
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ChannelError> {
        self.enter(MockOp::Read)?;
        self.file(path).ok_or_else(|| Self::not_found(path))
    }

    fn read_head(&self, path: &Path, lines: usize) -> Result<String, ChannelError> {
        self.enter(MockOp::ReadHead)?;
        let contents = self.file(path).ok_or_else(|| Self::not_found(path))?;
        Ok(contents.lines().take(lines).collect())
    }

    fn stat(&self, path: &Path) -> Result<Option<EntryKind>, ChannelError> {
        self.enter(MockOp::Stat)?;
        let state = self.lock();
        if state.files.contains_key(path) {
            Ok(Some(EntryKind::File))
        } else if state.dirs.iter().any(|d| d == path) {
            Ok(Some(EntryKind::Directory))
        } else {
            Ok(None)
        }
    }
}
