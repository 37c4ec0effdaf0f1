//! Channel for the machine this process runs on.

use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use super::{Channel, ChannelError, EntryKind, LaunchSpec, OutputSink, OutputStream};

/// Runs everything in-process with std.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalChannel;

impl LocalChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Channel for LocalChannel {
    fn describe(&self) -> String {
        "local".to_string()
    }

    fn create_text_temp_file(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
        contents: &str,
    ) -> Result<PathBuf, ChannelError> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        // The caller owns deletion from here on.
        let (_, path) = file.keep().map_err(|e| ChannelError::Io(e.error))?;
        Ok(path)
    }

    fn launch(&self, spec: &LaunchSpec, sink: &mut OutputSink<'_>) -> Result<i32, ChannelError> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut child = Command::new(program)
            .args(args)
            .envs(&spec.env)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let (tx, rx) = mpsc::channel::<(OutputStream, String)>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        // Ends once both pipes hit EOF.
        for (stream, line) in rx {
            sink(stream, &line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }

    fn delete(&self, path: &Path) -> Result<bool, ChannelError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ChannelError> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_head(&self, path: &Path, lines: usize) -> Result<String, ChannelError> {
        let mut reader = BufReader::new(fs::File::open(path)?);
        let mut head = String::new();
        let mut buf = Vec::new();
        for _ in 0..lines {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            head.push_str(line.trim_end_matches(['\r', '\n']));
        }
        Ok(head)
    }

    fn stat(&self, path: &Path) -> Result<Option<EntryKind>, ChannelError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::Other)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(
    pipe: R,
    stream: OutputStream,
    tx: mpsc::Sender<(OutputStream, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_temp_file_is_kept_with_prefix_and_suffix() {
        let dir = TempDir::new().unwrap();
        let channel = LocalChannel::new();
        let path = channel
            .create_text_temp_file(dir.path(), "openmeta", ".cmd", "echo hi\r\n")
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("openmeta"));
        assert!(name.ends_with(".cmd"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo hi\r\n");
    }

    #[test]
    fn test_temp_file_in_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = LocalChannel
            .create_text_temp_file(&missing, "openmeta", ".cmd", "")
            .unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[test]
    fn test_delete_reports_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.cmd");
        fs::write(&path, "x").unwrap();
        assert!(LocalChannel.delete(&path).unwrap());
        assert!(!LocalChannel.delete(&path).unwrap());
    }

    #[test]
    fn test_read_head_joins_lines_without_terminators() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.xme");
        fs::write(&path, "<?xml version=\"1.0\"?>\r\n<!DOCTYPE project SYSTEM \"mga.dtd\">\r\n<project>\r\n<name>x</name>\r\n<more/>\r\n").unwrap();

        let head = LocalChannel.read_head(&path, 4).unwrap();
        assert_eq!(
            head,
            "<?xml version=\"1.0\"?><!DOCTYPE project SYSTEM \"mga.dtd\"><project><name>x</name>"
        );
        assert_eq!(LocalChannel.read_head(&path, 1).unwrap(), "<?xml version=\"1.0\"?>");
    }

    #[test]
    fn test_stat_kinds() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.xme");
        fs::write(&file, "").unwrap();
        assert_eq!(LocalChannel.stat(&file).unwrap(), Some(EntryKind::File));
        assert_eq!(LocalChannel.stat(dir.path()).unwrap(), Some(EntryKind::Directory));
        assert_eq!(LocalChannel.stat(&dir.path().join("b")).unwrap(), None);
    }

    #[test]
    fn test_launch_empty_argv_is_io_error() {
        let spec = LaunchSpec {
            argv: vec![],
            env: BTreeMap::new(),
            cwd: PathBuf::from("."),
        };
        let err = LocalChannel.launch(&spec, &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_streams_output_and_returns_exit_code() {
        let dir = TempDir::new().unwrap();
        let mut env = BTreeMap::new();
        env.insert("TB_GREETING".to_string(), "hello".to_string());
        let spec = LaunchSpec {
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo $TB_GREETING; pwd; echo oops >&2; exit 3".to_string(),
            ],
            env,
            cwd: dir.path().to_path_buf(),
        };

        let mut lines = Vec::new();
        let code = LocalChannel
            .launch(&spec, &mut |stream, line| lines.push((stream, line.to_string())))
            .unwrap();

        assert_eq!(code, 3);
        assert!(lines.contains(&(OutputStream::Stdout, "hello".to_string())));
        assert!(lines.contains(&(OutputStream::Stderr, "oops".to_string())));
        let cwd = dir.path().canonicalize().unwrap();
        assert!(lines
            .iter()
            .any(|(_, l)| std::path::Path::new(l).canonicalize().ok() == Some(cwd.clone())));
    }

    #[test]
    fn test_launch_missing_program_is_io_error() {
        let spec = LaunchSpec {
            argv: vec!["definitely-not-a-real-program-openmeta".to_string()],
            env: BTreeMap::new(),
            cwd: PathBuf::from("."),
        };
        let err = LocalChannel.launch(&spec, &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, ChannelError::Io(_)));
    }
}
