//! Execution channels
//!
//! A [`Channel`] is the node a step runs on. The step only ever touches the
//! node's filesystem and process table through this trait, so the same code
//! runs against the local machine ([`LocalChannel`]) or a remote agent
//! reached over SSH ([`RemoteChannel`]).

mod local;
mod remote;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub use local::LocalChannel;
pub use openmeta_protocol::ops::EntryKind;
pub use openmeta_protocol::OutputStream;
pub use remote::{RemoteChannel, SshConfig};

use openmeta_protocol::{ErrorCode, RpcError};

/// A process to run on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Entries layered over the node's own environment.
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

/// Receives process output one line at a time, as it is produced.
pub type OutputSink<'a> = dyn FnMut(OutputStream, &str) + 'a;

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection to the node went away mid-request.
    #[error("channel closed: {0}")]
    Closed(String),

    #[error("agent error: {0}")]
    Remote(RpcError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChannelError {
    /// True when the failure is loss of the channel itself.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// True when the target path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            Self::Remote(e) => e.code == ErrorCode::NotFound,
            _ => false,
        }
    }
}

/// Operations a step needs from the node it runs on.
pub trait Channel {
    /// Short description for log lines ("local", "ssh openmeta@host").
    fn describe(&self) -> String;

    /// Create a text file with a random name in `dir` and return its path.
    fn create_text_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &str,
    ) -> Result<PathBuf, ChannelError>;

    /// Run a process to completion, forwarding its output to `sink`.
    fn launch(&self, spec: &LaunchSpec, sink: &mut OutputSink<'_>) -> Result<i32, ChannelError>;

    /// Delete a file. Returns false when it was already gone.
    fn delete(&self, path: &Path) -> Result<bool, ChannelError>;

    /// Read a whole file as (lossy) UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String, ChannelError>;

    /// Read the first `lines` lines, concatenated without line terminators.
    fn read_head(&self, path: &Path, lines: usize) -> Result<String, ChannelError>;

    /// Kind of the entry at `path`, `None` if nothing is there.
    fn stat(&self, path: &Path) -> Result<Option<EntryKind>, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ChannelError::Closed("eof".into()).is_channel_closed());
        assert!(!ChannelError::Protocol("x".into()).is_channel_closed());

        let missing = ChannelError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(missing.is_not_found());
        assert!(ChannelError::Remote(RpcError::not_found("a.xml")).is_not_found());
        assert!(!ChannelError::Closed("eof".into()).is_not_found());
    }
}
