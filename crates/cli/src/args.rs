//! Command-line flags and how they override the configuration file.

use std::path::PathBuf;

use clap::Parser;
use lminsight_core::config::BenchConfig;
use lminsight_core::error::BenchError;

/// Benchmark local LLMs while sampling CPU, RAM and GPU usage.
#[derive(Debug, Parser)]
#[command(name = "lminsight")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file. Flags below override its values.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model to benchmark (repeatable)
    #[arg(short, long = "model", value_name = "MODEL")]
    pub models: Vec<String>,

    /// File with one prompt per line
    #[arg(short, long, value_name = "FILE")]
    pub prompts: Option<PathBuf>,

    /// Repetitions per (model, prompt) pair
    #[arg(short, long)]
    pub iterations: Option<u32>,

    /// Milliseconds between host samples
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Abandon a model call after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Ollama base URL (defaults to OLLAMA_HOST, then http://localhost:11434)
    #[arg(long, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Directory receiving one sub-directory per invocation
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report to write: json, csv, table (repeatable or comma-separated)
    #[arg(short, long = "report", value_delimiter = ',')]
    pub reports: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load the configuration file (if any) and apply flag overrides.
    pub fn load_config(&self) -> Result<BenchConfig, BenchError> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BenchConfig) {
        if !self.models.is_empty() {
            config.models = self.models.clone();
        }
        if let Some(path) = &self.prompts {
            config.prompts_file = Some(path.clone());
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(ms) = self.interval_ms {
            config.sampling_interval_ms = ms;
        }
        if let Some(secs) = self.timeout_secs {
            config.run_timeout_secs = Some(secs);
        }
        if let Some(url) = &self.backend_url {
            config.backend_url = Some(url.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if !self.reports.is_empty() {
            config.reports = self.reports.clone();
        }
    }
}
