//! Form validation
//!
//! Configuration-time checks for the step fields. Results are advisory:
//! a run only turns a bad max-configs value into a warning.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::channel::{Channel, EntryKind};
use crate::config::parse_max_configs;

/// Extension of GME binary projects. They carry no magic number.
pub const NATIVE_PROJECT_EXTENSION: &str = ".mga";

/// Substring expected near the top of an XME export.
pub const XME_DOCTYPE_MARKER: &str = "<!DOCTYPE project SYSTEM \"mga";

/// Lines read when sniffing a model file.
pub const SNIFF_LINES: usize = 4;

/// Outcome of a field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum FormValidation {
    Ok,
    Warning(String),
    Error(String),
}

impl FormValidation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Warning(m) | Self::Error(m) => Some(m),
        }
    }
}

/// A workspace reachable through a channel.
#[derive(Clone, Copy)]
pub struct Workspace<'a> {
    pub channel: &'a dyn Channel,
    pub root: &'a Path,
}

impl<'a> Workspace<'a> {
    pub fn new(channel: &'a dyn Channel, root: &'a Path) -> Self {
        Self { channel, root }
    }

    /// Check that `value` names an existing file inside the workspace.
    pub fn validate_relative_path(&self, value: &str) -> FormValidation {
        let path = Path::new(value);
        if path.is_relative() && escapes_root(path) {
            return FormValidation::Error(format!("{} is outside the workspace", value));
        }
        let full: PathBuf = self.root.join(path);
        match self.channel.stat(&full) {
            Ok(Some(EntryKind::File)) => FormValidation::Ok,
            Ok(Some(_)) => FormValidation::Error(format!("{} is not a file", value)),
            Ok(None) => FormValidation::Error(format!("No such file: {}", value)),
            Err(e) => FormValidation::Error(format!("Could not check {}: {}", value, e)),
        }
    }
}

fn escapes_root(path: &Path) -> bool {
    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

/// Max Configs must be empty or a 32-bit integer.
pub fn validate_max_configs(value: &str) -> FormValidation {
    match parse_max_configs(value) {
        Ok(_) => FormValidation::Ok,
        Err(_) => FormValidation::Error("Max Configs must be a number".to_string()),
    }
}

/// Check a model path against a workspace.
///
/// Empty values and missing workspaces are not checked. Native `.mga`
/// projects are only checked for existence; anything else must look like
/// an XME export, otherwise a warning is returned.
pub fn validate_model_path(value: &str, workspace: Option<Workspace<'_>>) -> FormValidation {
    if value.is_empty() {
        return FormValidation::Ok;
    }
    let Some(workspace) = workspace else {
        return FormValidation::Ok;
    };

    let exists = workspace.validate_relative_path(value);
    if !exists.is_ok() {
        return exists;
    }

    if value.ends_with(NATIVE_PROJECT_EXTENSION) {
        return FormValidation::Ok;
    }

    match workspace
        .channel
        .read_head(&workspace.root.join(value), SNIFF_LINES)
    {
        Ok(head) if head.contains(XME_DOCTYPE_MARKER) => FormValidation::Ok,
        Ok(_) => FormValidation::Warning("Not a GME XME file".to_string()),
        Err(e) => {
            tracing::debug!(model = value, error = %e, "could not sniff model file");
            FormValidation::Warning(format!("Could not read {}: {}", value, e))
        }
    }
}
