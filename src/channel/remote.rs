//! Channel to a node running `openmeta-agent`.
//!
//! Each operation is one agent invocation: a single JSON request on stdin,
//! zero or more output frames and exactly one response frame on stdout.
//! By default the agent is reached with `ssh`; any command speaking the
//! same framing can stand in (see [`RemoteChannel::with_command`]).

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use serde::de::DeserializeOwned;
use serde::Serialize;

use openmeta_protocol::ops::{
    names, DeleteRequest, DeleteResponse, LaunchRequest, LaunchResponse, ReadHeadRequest,
    ReadHeadResponse, ReadRequest, ReadResponse, StatRequest, StatResponse, WriteTempRequest,
    WriteTempResponse,
};
use openmeta_protocol::{Frame, RpcRequest, PROTOCOL_MAX};

use super::{Channel, ChannelError, EntryKind, LaunchSpec, OutputSink};
use crate::config::AgentSettings;

/// SSH connection settings
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key_path: Option<String>,
    pub connect_timeout_seconds: u32,
    /// Server alive interval for detecting dead connections
    pub server_alive_interval: u32,
    pub server_alive_count_max: u32,
    /// Agent command line on the remote host.
    pub remote_command: Vec<String>,
}

impl From<&AgentSettings> for SshConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            host: settings.host.clone(),
            user: settings.user.clone(),
            port: settings.port,
            key_path: settings.key_path.clone(),
            connect_timeout_seconds: settings.connect_timeout_seconds,
            server_alive_interval: 15,
            server_alive_count_max: 2,
            remote_command: settings.command.clone(),
        }
    }
}

impl SshConfig {
    /// ssh argv (without the program name)
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_seconds),
            "-o".to_string(),
            format!("ServerAliveInterval={}", self.server_alive_interval),
            "-o".to_string(),
            format!("ServerAliveCountMax={}", self.server_alive_count_max),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];

        if let Some(ref key_path) = self.key_path {
            args.push("-i".to_string());
            args.push(key_path.clone());
        }

        args.push(format!("{}@{}", self.user, self.host));
        args.extend(self.remote_command.iter().cloned());
        args
    }
}

/// Channel that drives a remote agent.
#[derive(Debug, Clone)]
pub struct RemoteChannel {
    program: String,
    args: Vec<String>,
    label: String,
}

impl RemoteChannel {
    /// Reach the agent over SSH.
    pub fn ssh(config: &SshConfig) -> Self {
        Self {
            program: "ssh".to_string(),
            args: config.ssh_args(),
            label: format!("ssh {}@{}", config.user, config.host),
        }
    }

    /// Reach the agent by running an arbitrary command.
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            label: format!("agent via {}", program),
            program,
            args,
        }
    }

    fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        op: &str,
        payload: &Req,
        sink: &mut OutputSink<'_>,
    ) -> Result<Resp, ChannelError> {
        let request = RpcRequest::new(PROTOCOL_MAX, op, new_request_id(), payload)?;
        let request_json = serde_json::to_string(&request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ChannelError::Closed(format!("failed to start {}: {}", self.program, e)))?;

        // Drained concurrently so a chatty agent or ssh never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(drain_tail);

        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{}", request_json)
                .map_err(|e| ChannelError::Closed(format!("failed to send request: {}", e)))?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChannelError::Closed("agent stdout unavailable".to_string()))?;
        let mut response = None;
        for line in BufReader::new(stdout).lines() {
            let line = line.map_err(|e| ChannelError::Closed(format!("read failed: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            match Frame::from_line(&line) {
                Ok(Frame::Output { stream, line }) => sink(stream, &line),
                Ok(Frame::Response(r)) => {
                    response = Some(r);
                    break;
                }
                Err(_) => tracing::debug!(line = %line, "ignoring non-frame agent output"),
            }
        }

        let status = child.wait()?;
        let stderr_output = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let response = response.ok_or_else(|| {
            ChannelError::Closed(format!(
                "agent exited ({}) before responding{}",
                status,
                if stderr_output.trim().is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr_output.trim())
                }
            ))
        })?;

        if response.request_id != request.request_id {
            return Err(ChannelError::Protocol(format!(
                "response for request '{}' while waiting for '{}'",
                response.request_id, request.request_id
            )));
        }
        response.into_result().map_err(ChannelError::Remote)
    }
}

/// Agent stderr kept for error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Read a pipe to EOF on a thread, keeping only its last bytes.
fn drain_tail<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut tail = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                    }
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}

impl Channel for RemoteChannel {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn create_text_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &str,
    ) -> Result<PathBuf, ChannelError> {
        let request = WriteTempRequest {
            dir: path_string(dir),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            contents: contents.to_string(),
        };
        let response: WriteTempResponse = self.call(names::WRITE_TEMP, &request, &mut |_, _| {})?;
        Ok(PathBuf::from(response.path))
    }

    fn launch(&self, spec: &LaunchSpec, sink: &mut OutputSink<'_>) -> Result<i32, ChannelError> {
        let request = LaunchRequest {
            argv: spec.argv.clone(),
            env: spec.env.clone(),
            cwd: path_string(&spec.cwd),
        };
        let response: LaunchResponse = self.call(names::LAUNCH, &request, sink)?;
        Ok(response.exit_code)
    }

    fn delete(&self, path: &Path) -> Result<bool, ChannelError> {
        let request = DeleteRequest {
            path: path_string(path),
        };
        let response: DeleteResponse = self.call(names::DELETE, &request, &mut |_, _| {})?;
        Ok(response.deleted)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ChannelError> {
        let request = ReadRequest {
            path: path_string(path),
        };
        let response: ReadResponse = self.call(names::READ, &request, &mut |_, _| {})?;
        Ok(response.contents)
    }

    fn read_head(&self, path: &Path, lines: usize) -> Result<String, ChannelError> {
        let request = ReadHeadRequest {
            path: path_string(path),
            lines,
        };
        let response: ReadHeadResponse = self.call(names::READ_HEAD, &request, &mut |_, _| {})?;
        Ok(response.head)
    }

    fn stat(&self, path: &Path) -> Result<Option<EntryKind>, ChannelError> {
        let request = StatRequest {
            path: path_string(path),
        };
        let response: StatResponse = self.call(names::STAT, &request, &mut |_, _| {})?;
        Ok(response.kind)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn new_request_id() -> String {
    format!("req-{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_config() -> SshConfig {
        SshConfig::from(&AgentSettings {
            host: "win-builder-01".to_string(),
            key_path: Some("/keys/ci".to_string()),
            ..AgentSettings::default()
        })
    }

    #[test]
    fn test_ssh_args_end_with_target_and_agent() {
        let args = ssh_config().ssh_args();
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/ci"]));
        let tail = &args[args.len() - 3..];
        assert_eq!(tail, ["openmeta@win-builder-01", "openmeta-agent", "rpc"]);
    }

    #[test]
    fn test_describe_names_target() {
        assert_eq!(RemoteChannel::ssh(&ssh_config()).describe(), "ssh openmeta@win-builder-01");
    }

    #[test]
    fn test_request_ids_differ() {
        assert_ne!(new_request_id(), new_request_id());
    }

    #[cfg(unix)]
    #[test]
    fn test_agent_exiting_without_response_is_channel_closed() {
        let channel = RemoteChannel::with_command(
            "sh",
            vec!["-c".to_string(), "cat >/dev/null; echo lost >&2; exit 255".to_string()],
        );
        let err = channel.delete(Path::new("C:\\ws\\openmeta1.cmd")).unwrap_err();
        assert!(err.is_channel_closed(), "got {:?}", err);
        assert!(err.to_string().contains("lost"));
    }

    /// 200 KB is well past any pipe buffer.
    #[cfg(unix)]
    const NOISY_STDERR: &str = "head -c 200000 /dev/zero | tr '\\0' x >&2";

    #[cfg(unix)]
    #[test]
    fn test_large_agent_stderr_does_not_block_response() {
        let script = format!(
            r#"read -r req; id=$(printf '%s' "$req" | sed 's/.*"request_id":"\([^"]*\)".*/\1/'); {}; printf '{{"frame":"response","protocol_version":1,"request_id":"%s","ok":true,"payload":{{"deleted":true}}}}\n' "$id""#,
            NOISY_STDERR
        );
        let channel = RemoteChannel::with_command("sh", vec!["-c".to_string(), script]);
        let deleted = channel.delete(Path::new("C:\\ws\\openmeta1.cmd")).unwrap();
        assert!(deleted);
    }

    #[cfg(unix)]
    #[test]
    fn test_closed_error_keeps_only_stderr_tail() {
        let script = format!("cat >/dev/null; {}; echo lost >&2; exit 255", NOISY_STDERR);
        let channel = RemoteChannel::with_command("sh", vec!["-c".to_string(), script]);
        let err = channel.stat(Path::new("model.xme")).unwrap_err();
        assert!(err.is_channel_closed(), "got {:?}", err);
        let message = err.to_string();
        assert!(message.trim_end().ends_with("lost"));
        assert!(message.len() < STDERR_TAIL_BYTES + 200);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_agent_program_is_channel_closed() {
        let channel = RemoteChannel::with_command("definitely-not-an-agent-openmeta", vec![]);
        let err = channel.stat(Path::new("model.xme")).unwrap_err();
        assert!(err.is_channel_closed());
    }
}
