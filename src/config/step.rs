//! Step fields as the host supplies them, and their parsed form.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Results file the runner is told to write when nothing else is configured.
pub const DEFAULT_RESULTS_FILE: &str = "openmeta-testbenches-result.xml";

/// The raw string fields of the step form.
///
/// Values are kept verbatim; parsing happens in [`StepConfig::from_fields`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepFields {
    /// Path of the model file, relative to the workspace or absolute.
    pub model_name: String,
    /// Comma-separated exclusion patterns.
    pub exclude_patterns: String,
    /// Optional numeric limit, empty when unconstrained.
    pub max_configs: String,
    /// Name of the XML results file written by the runner.
    pub results_file: String,
}

impl Default for StepFields {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            exclude_patterns: String::new(),
            max_configs: String::new(),
            results_file: DEFAULT_RESULTS_FILE.to_string(),
        }
    }
}

/// Parsed step configuration, owned by a single execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepConfig {
    model_path: String,
    exclude_patterns: Vec<String>,
    /// Raw field; a bad value is reported at run time, never rejected.
    max_configs: String,
    results_file: String,
}

impl StepConfig {
    /// Build a configuration directly from already-split values.
    ///
    /// An empty model path is accepted here; the command it produces fails
    /// when it runs.
    pub fn new(model_path: impl Into<String>, exclude_patterns: Vec<String>) -> Self {
        Self {
            model_path: model_path.into(),
            exclude_patterns: exclude_patterns
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect(),
            max_configs: String::new(),
            results_file: DEFAULT_RESULTS_FILE.to_string(),
        }
    }

    /// Parse the form fields.
    pub fn from_fields(fields: &StepFields) -> Self {
        let results_file = if fields.results_file.is_empty() {
            DEFAULT_RESULTS_FILE.to_string()
        } else {
            fields.results_file.clone()
        };

        Self {
            model_path: fields.model_name.clone(),
            exclude_patterns: split_patterns(&fields.exclude_patterns),
            max_configs: fields.max_configs.clone(),
            results_file,
        }
    }

    /// Override the results file name.
    pub fn with_results_file(mut self, results_file: impl Into<String>) -> Self {
        self.results_file = results_file.into();
        self
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Parsed limit. `None` when the field is empty or not a number.
    pub fn max_configs(&self) -> Option<i32> {
        parse_max_configs(&self.max_configs).ok().flatten()
    }

    pub fn max_configs_field(&self) -> &str {
        &self.max_configs
    }

    pub fn results_file(&self) -> &str {
        &self.results_file
    }
}

/// Split the exclusion field on commas.
///
/// Entries are used verbatim: no trimming, only empty entries are dropped.
pub fn split_patterns(field: &str) -> Vec<String> {
    field
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the max-configs field. Empty means unconstrained.
pub fn parse_max_configs(field: &str) -> Result<Option<i32>, ConfigError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<i32>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidMaxConfigs(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(model: &str, excludes: &str, max: &str) -> StepFields {
        StepFields {
            model_name: model.to_string(),
            exclude_patterns: excludes.to_string(),
            max_configs: max.to_string(),
            ..StepFields::default()
        }
    }

    #[test]
    fn test_split_drops_empty_entries() {
        assert!(split_patterns("").is_empty());
        assert_eq!(split_patterns("foo,,bar,"), vec!["foo", "bar"]);
    }

    #[test]
    fn test_split_preserves_whitespace() {
        assert_eq!(split_patterns(" foo, bar"), vec![" foo", " bar"]);
    }

    #[test]
    fn test_from_fields_defaults() {
        let config = StepConfig::from_fields(&fields("model.xme", "", ""));
        assert_eq!(config.model_path(), "model.xme");
        assert!(config.exclude_patterns().is_empty());
        assert_eq!(config.max_configs(), None);
        assert_eq!(config.results_file(), DEFAULT_RESULTS_FILE);
    }

    #[test]
    fn test_from_fields_max_configs() {
        let config = StepConfig::from_fields(&fields("m.xme", "", "42"));
        assert_eq!(config.max_configs(), Some(42));

        assert_eq!(config.max_configs_field(), "42");
    }

    #[test]
    fn test_bad_max_configs_is_kept_verbatim() {
        let config = StepConfig::from_fields(&fields("m.xme", "", "abc"));
        assert_eq!(config.max_configs(), None);
        assert_eq!(config.max_configs_field(), "abc");
        assert!(matches!(
            parse_max_configs(config.max_configs_field()),
            Err(ConfigError::InvalidMaxConfigs(ref v)) if v == "abc"
        ));
    }

    #[test]
    fn test_empty_model_path_is_accepted() {
        let config = StepConfig::from_fields(&fields("", "foo", ""));
        assert_eq!(config.model_path(), "");
        assert_eq!(config.exclude_patterns(), ["foo"]);
    }

    #[test]
    fn test_empty_results_file_falls_back() {
        let mut f = fields("m.xme", "", "");
        f.results_file = String::new();
        let config = StepConfig::from_fields(&f);
        assert_eq!(config.results_file(), DEFAULT_RESULTS_FILE);
    }
}
