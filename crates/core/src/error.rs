use std::path::PathBuf;

/// Structural errors that abort the pipeline.
///
/// Per-run failures (backend errors, timeouts, sampler hiccups) are never
/// represented here: they degrade a record's fields instead.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Aggregation conflict: feature '{field}' is produced more than once")]
    AggregationConflict { field: String },

    #[error("Schema mismatch: record for {model} prompt {prompt_index} iteration {iteration_index} has a different feature set")]
    SchemaMismatch {
        model: String,
        prompt_index: usize,
        iteration_index: u32,
    },
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
