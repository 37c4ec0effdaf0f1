//! Effective configuration with provenance
//!
//! Layers are merged as JSON values:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)
//!
//! The merged value is then deserialized into [`LaneConfig`]. Every file
//! that contributed is recorded with its SHA-256 digest so a run log can say
//! exactly which configuration it ran with.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::lane::LaneConfig;
use super::ConfigError;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Repo,
    Cli,
}

/// A contributing config source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration plus where it came from
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub created_at: DateTime<Utc>,

    /// The typed configuration
    pub config: LaneConfig,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Env keys whose values are hidden when the config is printed
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credential"];

impl EffectiveConfig {
    /// Build effective config from layers
    pub fn build(
        host_config_path: Option<&Path>,
        repo_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let builtin = serde_json::to_value(LaneConfig::default())
            .map_err(|e| ConfigError::ParseError(format!("defaults: {}", e)))?;

        let mut layers = vec![builtin];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Repo, repo_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let config: LaneConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))?;
        config.validate()?;

        Ok(Self {
            created_at: Utc::now(),
            config,
            sources,
        })
    }

    /// Pretty JSON with secret-looking env values replaced
    pub fn to_redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(env) = value
            .get_mut("config")
            .and_then(|c| c.get_mut("env"))
            .and_then(Value::as_object_mut)
        {
            for (key, val) in env.iter_mut() {
                let key_lower = key.to_lowercase();
                if SECRET_KEYS.iter().any(|s| key_lower.contains(s)) {
                    *val = Value::String("[REDACTED]".to_string());
                }
            }
        }
        serde_json::to_string_pretty(&value)
    }
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

    Ok((toml_to_json(toml_value), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep merge two JSON values; the overlay wins except where both are objects.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
