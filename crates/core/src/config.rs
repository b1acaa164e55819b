//! Benchmark configuration.
//!
//! [`BenchConfig`] is deserialized from a JSON document, optionally
//! overridden by CLI flags, validated once, and then passed by reference
//! to the orchestrator. Nothing reads configuration from globals.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::client::GenerationOptions;
use crate::error::BenchError;

/// Default sampling interval between host readings.
pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 500;

/// Smallest accepted sampling interval. CPU usage is a delta between two
/// refreshes and `sysinfo` does not update it faster than 200ms.
pub const MIN_SAMPLING_INTERVAL_MS: u64 = 200;

/// Default directory under which each pipeline run writes its artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "results";

/// Renderers enabled when the document does not list any.
pub const DEFAULT_REPORTS: &[&str] = &["json", "csv", "table"];

fn default_iterations() -> u32 {
    1
}

fn default_sampling_interval_ms() -> u64 {
    DEFAULT_SAMPLING_INTERVAL_MS
}

fn default_reports() -> Vec<String> {
    DEFAULT_REPORTS.iter().map(|s| s.to_string()).collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

/// Static configuration handed to the pipeline at start.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
    /// Model identifiers to benchmark, in run order.
    #[serde(default)]
    pub models: Vec<String>,
    /// File with one prompt per line. Takes precedence over `prompts`.
    #[serde(default)]
    pub prompts_file: Option<PathBuf>,
    /// Inline prompts, used when no `prompts_file` is given.
    #[serde(default)]
    pub prompts: Vec<String>,
    /// Repetitions per (model, prompt) pair.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
    /// Abandon a model call after this many seconds. No limit when `None`.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
    /// Backend base URL. Falls back to `OLLAMA_HOST`, then the local default.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Active renderer names (consumed by the reporting layer only).
    #[serde(default = "default_reports")]
    pub reports: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Generation options applied to every model.
    #[serde(default)]
    pub options: GenerationOptions,
    /// Per-model option overrides, merged over `options`.
    #[serde(default)]
    pub model_options: HashMap<String, GenerationOptions>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            prompts_file: None,
            prompts: Vec::new(),
            iterations: default_iterations(),
            sampling_interval_ms: default_sampling_interval_ms(),
            run_timeout_secs: None,
            backend_url: None,
            reports: default_reports(),
            output_dir: default_output_dir(),
            options: GenerationOptions::new(),
            model_options: HashMap::new(),
        }
    }
}

impl BenchConfig {
    /// Read and parse a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, BenchError> {
        let text = std::fs::read_to_string(path).map_err(|source| BenchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
            .map_err(|e| BenchError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_json_str(text: &str) -> Result<Self, BenchError> {
        serde_json::from_str(text).map_err(|e| BenchError::config(format!("invalid JSON: {e}")))
    }

    /// Check structural constraints. Called once before any run executes.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.models.is_empty() {
            return Err(BenchError::config("at least one model is required"));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.trim().is_empty() {
                return Err(BenchError::config("model names must not be blank"));
            }
            if !seen.insert(model.as_str()) {
                return Err(BenchError::config(format!("model '{model}' is listed twice")));
            }
        }

        if self.iterations == 0 {
            return Err(BenchError::config("iterations must be at least 1"));
        }

        if self.sampling_interval_ms < MIN_SAMPLING_INTERVAL_MS {
            return Err(BenchError::config(format!(
                "sampling_interval_ms must be at least {MIN_SAMPLING_INTERVAL_MS}"
            )));
        }

        if self.run_timeout_secs == Some(0) {
            return Err(BenchError::config("run_timeout_secs must be positive"));
        }

        if self.prompts_file.is_none() && self.prompts.is_empty() {
            return Err(BenchError::config("no prompts_file or inline prompts given"));
        }

        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Options for `model`: global options with per-model keys on top.
    pub fn options_for(&self, model: &str) -> GenerationOptions {
        let mut merged = self.options.clone();
        if let Some(overrides) = self.model_options.get(model) {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Load the ordered prompt list from `prompts_file` or the inline list.
    ///
    /// An empty result is a configuration error.
    pub fn resolve_prompts(&self) -> Result<Vec<String>, BenchError> {
        let prompts = match &self.prompts_file {
            Some(path) => load_prompts(path)?,
            None => self
                .prompts
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        };

        if prompts.is_empty() {
            return Err(BenchError::config("prompt source contains no prompts"));
        }
        Ok(prompts)
    }
}

/// Split prompt text into one prompt per non-blank line, preserving order.
pub fn parse_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a prompts file. A missing file is reported with its path.
pub fn load_prompts(path: &Path) -> Result<Vec<String>, BenchError> {
    let text = std::fs::read_to_string(path).map_err(|source| BenchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let prompts = parse_prompts(&text);
    tracing::debug!(path = %path.display(), prompts = prompts.len(), "Loaded prompt file");
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn valid() -> BenchConfig {
        BenchConfig {
            models: vec!["m1".into()],
            prompts: vec!["p1".into()],
            ..BenchConfig::default()
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = BenchConfig::from_json_str(r#"{"models": ["llama3.2"]}"#).unwrap();
        assert_eq!(config.iterations, 1);
        assert_eq!(config.sampling_interval_ms, DEFAULT_SAMPLING_INTERVAL_MS);
        assert_eq!(config.reports, vec!["json", "csv", "table"]);
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert!(config.run_timeout().is_none());
    }

    #[test]
    fn malformed_json_is_configuration_error() {
        assert_matches!(
            BenchConfig::from_json_str("{models: nope"),
            Err(BenchError::Configuration(_))
        );
    }

    #[test]
    fn empty_model_list_rejected() {
        let config = BenchConfig {
            models: vec![],
            ..valid()
        };
        assert_matches!(config.validate(), Err(BenchError::Configuration(msg)) if msg.contains("model"));
    }

    #[test]
    fn duplicate_models_rejected() {
        let config = BenchConfig {
            models: vec!["m1".into(), "m1".into()],
            ..valid()
        };
        assert_matches!(config.validate(), Err(BenchError::Configuration(_)));
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = BenchConfig {
            iterations: 0,
            ..valid()
        };
        assert_matches!(config.validate(), Err(BenchError::Configuration(_)));
    }

    #[test]
    fn tiny_interval_rejected() {
        let config = BenchConfig {
            sampling_interval_ms: 1,
            ..valid()
        };
        assert_matches!(config.validate(), Err(BenchError::Configuration(_)));
    }

    #[test]
    fn interval_below_cpu_refresh_floor_rejected() {
        let config = BenchConfig {
            sampling_interval_ms: 100,
            ..valid()
        };
        assert_matches!(config.validate(), Err(BenchError::Configuration(msg)) if msg.contains("200"));

        let config = BenchConfig {
            sampling_interval_ms: MIN_SAMPLING_INTERVAL_MS,
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn model_options_override_globals() {
        let config = BenchConfig::from_json_str(
            &json!({
                "models": ["a", "b"],
                "options": {"temperature": 0.7, "top_k": 40},
                "model_options": {"b": {"temperature": 0.1}}
            })
            .to_string(),
        )
        .unwrap();

        let a = config.options_for("a");
        assert_eq!(a["temperature"], json!(0.7));

        let b = config.options_for("b");
        assert_eq!(b["temperature"], json!(0.1));
        assert_eq!(b["top_k"], json!(40));
    }

    #[test]
    fn parse_prompts_skips_blank_lines_and_keeps_order() {
        let prompts = parse_prompts("first\n\n  second  \n\t\nthird\n");
        assert_eq!(prompts, vec!["first", "second", "third"]);
    }

    #[test]
    fn missing_prompts_file_reports_path() {
        let config = BenchConfig {
            prompts_file: Some(PathBuf::from("/definitely/not/here/prompts.txt")),
            ..valid()
        };
        assert_matches!(config.resolve_prompts(), Err(BenchError::Io { path, .. }) if path.ends_with("prompts.txt"));
    }

    #[test]
    fn prompts_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, "from file\n").unwrap();

        let config = BenchConfig {
            prompts_file: Some(path),
            ..valid()
        };
        assert_eq!(config.resolve_prompts().unwrap(), vec!["from file"]);
    }

    #[test]
    fn empty_prompt_source_rejected() {
        let config = BenchConfig {
            prompts: vec!["   ".into()],
            ..valid()
        };
        assert_matches!(config.resolve_prompts(), Err(BenchError::Configuration(_)));
    }
}
