//! Remote Channel Round-Trip Tests
//!
//! Drives the real agent binary through `RemoteChannel`, with the agent
//! started directly instead of over SSH.

use std::fs;
use std::path::Path;

use openmeta_testbench::channel::{EntryKind, OutputStream};
use openmeta_testbench::{Channel, LaunchSpec, RemoteChannel};
use tempfile::TempDir;

fn agent() -> RemoteChannel {
    RemoteChannel::with_command(env!("CARGO_BIN_EXE_openmeta-agent"), vec!["rpc".to_string()])
}

#[test]
fn test_file_operations_round_trip() {
    let dir = TempDir::new().unwrap();
    let channel = agent();

    let script = channel
        .create_text_temp_file(dir.path(), "openmeta", ".cmd", "line one\r\nline two\r\n")
        .unwrap();
    assert!(script.starts_with(dir.path()));
    assert_eq!(fs::read_to_string(&script).unwrap(), "line one\r\nline two\r\n");

    assert_eq!(channel.stat(&script).unwrap(), Some(EntryKind::File));
    assert_eq!(channel.stat(dir.path()).unwrap(), Some(EntryKind::Directory));
    assert_eq!(channel.read_head(&script, 1).unwrap(), "line one");
    assert_eq!(channel.read_to_string(&script).unwrap(), "line one\r\nline two\r\n");

    assert!(channel.delete(&script).unwrap());
    assert!(!channel.delete(&script).unwrap());
    assert_eq!(channel.stat(&script).unwrap(), None);
}

#[test]
fn test_missing_file_maps_to_not_found() {
    let dir = TempDir::new().unwrap();
    let err = agent()
        .read_to_string(&dir.path().join("openmeta-testbenches-result.xml"))
        .unwrap_err();
    assert!(err.is_not_found(), "got {:?}", err);
    assert!(!err.is_channel_closed());
}

#[test]
fn test_write_into_missing_dir_is_agent_error() {
    let dir = TempDir::new().unwrap();
    let err = agent()
        .create_text_temp_file(&dir.path().join("missing"), "openmeta", ".cmd", "")
        .unwrap_err();
    assert!(!err.is_channel_closed(), "got {:?}", err);
}

#[cfg(unix)]
#[test]
fn test_launch_streams_output_and_exit_code() {
    let dir = TempDir::new().unwrap();
    let spec = LaunchSpec {
        argv: vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo out; echo err >&2; pwd > where.txt; exit 4".to_string(),
        ],
        env: Default::default(),
        cwd: dir.path().to_path_buf(),
    };

    let mut lines = Vec::new();
    let code = agent()
        .launch(&spec, &mut |stream, line| lines.push((stream, line.to_string())))
        .unwrap();

    assert_eq!(code, 4);
    assert!(lines.contains(&(OutputStream::Stdout, "out".to_string())));
    assert!(lines.contains(&(OutputStream::Stderr, "err".to_string())));
    let cwd = fs::read_to_string(dir.path().join("where.txt")).unwrap();
    assert_eq!(
        Path::new(cwd.trim()).canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[cfg(unix)]
#[test]
fn test_step_runs_through_agent() {
    use openmeta_testbench::{
        BuildStep, CleanupStatus, EffectiveConfig, MemoryLog, RunContext, StepDescriptor, Verdict,
    };

    let workspace = TempDir::new().unwrap();
    let overrides = serde_json::json!({
        "step": { "model_name": "model.xme" },
        "launch": {
            "interpreter": [
                "sh",
                "-c",
                "echo benches; printf '<testsuite tests=\"1\" failures=\"1\" errors=\"0\"/>' > openmeta-testbenches-result.xml",
            ],
        },
    });
    let effective = EffectiveConfig::build(None, None, Some(overrides)).unwrap();
    let step = StepDescriptor::new().new_step(&effective.config);

    let channel = agent();
    let mut log = MemoryLog::new();
    let outcome = {
        let mut ctx = RunContext::new(&channel, &mut log, workspace.path());
        step.perform(&mut ctx)
    };

    assert_eq!(outcome.verdict, Verdict::Unstable, "log: {:?}", log.entries());
    assert_eq!(outcome.archive.map(|a| a.failures), Some(1));
    assert_eq!(outcome.cleanup, CleanupStatus::Deleted);
    assert_eq!(log.output_lines(), vec!["benches"]);
}
