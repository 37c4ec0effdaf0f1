//! Toolchain resolution
//!
//! The OpenMETA install directory is recorded in the Windows registry. The
//! generated script resolves it itself, so the same script works on
//! whichever node runs it. A fixed install path can be configured instead,
//! in which case no registry lookup is emitted.
//!
//! The resolved directory always ends with a path separator: the runner
//! invocation appends `bin\...` directly.

use regex_lite::Regex;

use crate::config::ToolchainSettings;

/// Variable the script stores the install directory in.
pub const TOOLCHAIN_VAR: &str = "META_PATH";

/// Toolchain resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("META_PATH is not set and no registry entry was found")]
    NotInstalled,

    #[error("registry query failed: {0}")]
    QueryFailed(String),
}

/// How the script finds the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainLocator {
    /// Query the registry at run time.
    Registry {
        exe: String,
        key: String,
        value: String,
    },
    /// Use a known install directory.
    Fixed(String),
}

impl ToolchainLocator {
    pub fn from_settings(settings: &ToolchainSettings) -> Self {
        match &settings.install_path {
            Some(path) => Self::Fixed(with_trailing_separator(path)),
            None => Self::Registry {
                exe: settings.registry_exe.clone(),
                key: settings.registry_key.clone(),
                value: settings.registry_value.clone(),
            },
        }
    }

    /// Batch line that leaves the install directory in `%META_PATH%`.
    ///
    /// `reg query` prints two header lines, then `<name> <type> <data>`;
    /// the loop keeps everything from the third token on.
    pub fn script_preamble(&self) -> String {
        match self {
            Self::Registry { exe, key, value } => format!(
                "FOR /F \"skip=2 tokens=2,*\" %%A IN ('{exe} query \"{key}\" /v \"{value}\"') DO SET {var}=%%B",
                exe = exe,
                key = key,
                value = value,
                var = TOOLCHAIN_VAR,
            ),
            Self::Fixed(path) => format!("SET {}={}", TOOLCHAIN_VAR, path),
        }
    }

    /// Resolve the install directory on the current host.
    ///
    /// `META_PATH` in the environment wins; otherwise a fixed path is
    /// returned as-is and the registry is queried on Windows.
    pub fn resolve_local(&self) -> Result<String, ToolchainError> {
        if let Ok(path) = std::env::var(TOOLCHAIN_VAR) {
            if !path.is_empty() {
                return Ok(with_trailing_separator(&path));
            }
        }
        match self {
            Self::Fixed(path) => Ok(path.clone()),
            Self::Registry { key, value, .. } => query_registry(key, value),
        }
    }
}

#[cfg(windows)]
fn query_registry(key: &str, value: &str) -> Result<String, ToolchainError> {
    use std::process::Command;

    // 32-bit view, matching the SysWoW64 REG.exe the script uses.
    let output = Command::new("reg")
        .args(["query", key, "/v", value, "/reg:32"])
        .output()
        .map_err(|e| ToolchainError::QueryFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(ToolchainError::NotInstalled);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_reg_query(&stdout, value)
        .map(|p| with_trailing_separator(&p))
        .ok_or(ToolchainError::NotInstalled)
}

#[cfg(not(windows))]
fn query_registry(_key: &str, _value: &str) -> Result<String, ToolchainError> {
    Err(ToolchainError::NotInstalled)
}

/// Extract the data of `value` from `reg query` output.
pub fn parse_reg_query(output: &str, value: &str) -> Option<String> {
    let pattern = format!(
        r"(?m)^\s+{}\s+REG_(?:SZ|EXPAND_SZ)\s+(.+?)\s*$",
        regex_lite::escape(value)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn with_trailing_separator(path: &str) -> String {
    if path.ends_with('\\') || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}\\", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REG_OUTPUT: &str = "\r\nHKEY_LOCAL_MACHINE\\software\\META\r\n    META_PATH    REG_SZ    C:\\Program Files (x86)\\META\\\r\n\r\n";

    #[test]
    fn test_registry_preamble_line() {
        let locator = ToolchainLocator::from_settings(&ToolchainSettings::default());
        assert_eq!(
            locator.script_preamble(),
            "FOR /F \"skip=2 tokens=2,*\" %%A IN ('%SystemRoot%\\SysWoW64\\REG.exe query \"HKLM\\software\\META\" /v \"META_PATH\"') DO SET META_PATH=%%B"
        );
    }

    #[test]
    fn test_fixed_path_gets_separator() {
        let settings = ToolchainSettings {
            install_path: Some("D:\\OpenMETA".to_string()),
            ..ToolchainSettings::default()
        };
        let locator = ToolchainLocator::from_settings(&settings);
        assert_eq!(locator, ToolchainLocator::Fixed("D:\\OpenMETA\\".to_string()));
        assert_eq!(locator.script_preamble(), "SET META_PATH=D:\\OpenMETA\\");
    }

    #[test]
    fn test_parse_reg_query_with_spaces_in_path() {
        assert_eq!(
            parse_reg_query(REG_OUTPUT, "META_PATH").as_deref(),
            Some("C:\\Program Files (x86)\\META\\")
        );
    }

    #[test]
    fn test_parse_reg_query_missing_value() {
        assert_eq!(parse_reg_query(REG_OUTPUT, "OTHER"), None);
        assert_eq!(parse_reg_query("", "META_PATH"), None);
    }
}
