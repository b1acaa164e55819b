//! Core data model shared by the samplers, extractors, and aggregator.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::metric_names::{
    COLUMN_CPU_LOAD_1M, COLUMN_CPU_PERCENT, COLUMN_GPU_LOAD_PERCENT, COLUMN_GPU_MEM_PERCENT,
    COLUMN_RAM_PERCENT, COLUMN_RAM_USED_GB,
};

/// Named scalar features for one run. `None` means "no data" and is kept
/// distinct from zero all the way to the exported record.
///
/// A `BTreeMap` keeps iteration (and therefore serialization) order stable.
pub type FeatureMap = BTreeMap<String, Option<f64>>;

/// Identifies one cell of the run matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunIdentity {
    pub model_name: String,
    /// Zero-based position of the prompt in the prompt source.
    pub prompt_index: usize,
    /// Zero-based repetition counter for this (model, prompt) pair.
    pub iteration_index: u32,
}

/// One instantaneous host reading taken by the sampling task.
///
/// Each metric column is independently optional: a disabled sampler or a
/// failed read leaves its column `None` without affecting the others.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleReading {
    pub timestamp: Instant,
    pub cpu_percent: Option<f64>,
    pub cpu_load_1m_normalized: Option<f64>,
    pub ram_percent: Option<f64>,
    pub ram_used_gb: Option<f64>,
    pub gpu_load_percent: Option<f64>,
    pub gpu_mem_percent: Option<f64>,
}

/// Every sample column, in feature emission order.
pub const SAMPLE_COLUMNS: &[&str] = &[
    COLUMN_CPU_PERCENT,
    COLUMN_CPU_LOAD_1M,
    COLUMN_RAM_PERCENT,
    COLUMN_RAM_USED_GB,
    COLUMN_GPU_LOAD_PERCENT,
    COLUMN_GPU_MEM_PERCENT,
];

impl SampleReading {
    /// A reading at `timestamp` with every column absent.
    pub fn empty(timestamp: Instant) -> Self {
        Self {
            timestamp,
            cpu_percent: None,
            cpu_load_1m_normalized: None,
            ram_percent: None,
            ram_used_gb: None,
            gpu_load_percent: None,
            gpu_mem_percent: None,
        }
    }

    /// Value of a sample column by name; `None` for absent data and for
    /// names outside [`SAMPLE_COLUMNS`].
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            COLUMN_CPU_PERCENT => self.cpu_percent,
            COLUMN_CPU_LOAD_1M => self.cpu_load_1m_normalized,
            COLUMN_RAM_PERCENT => self.ram_percent,
            COLUMN_RAM_USED_GB => self.ram_used_gb,
            COLUMN_GPU_LOAD_PERCENT => self.gpu_load_percent,
            COLUMN_GPU_MEM_PERCENT => self.gpu_mem_percent,
            _ => None,
        }
    }

    /// `true` when at least one column carries a value.
    pub fn has_data(&self) -> bool {
        SAMPLE_COLUMNS.iter().any(|column| self.value(column).is_some())
    }
}

/// Readings captured during exactly one model invocation.
///
/// Built once by [`SamplerSession::seal`] after the sampling task has been
/// joined; there is no way to append afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSession {
    readings: Vec<SampleReading>,
    start_time: Instant,
    end_time: Instant,
}

impl SamplerSession {
    /// Freeze a reading sequence together with its invocation window.
    ///
    /// Readings are ordered by timestamp so the sequence is monotonically
    /// non-decreasing regardless of how the sampler delivered them.
    pub fn seal(mut readings: Vec<SampleReading>, start_time: Instant, end_time: Instant) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self {
            readings,
            start_time,
            end_time,
        }
    }

    pub fn readings(&self) -> &[SampleReading] {
        &self.readings
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn end_time(&self) -> Instant {
        self.end_time
    }

    /// Wall-clock length of the invocation window.
    pub fn duration(&self) -> Duration {
        self.end_time.saturating_duration_since(self.start_time)
    }

    /// Readings whose timestamp falls inside `[start_time, end_time]`.
    ///
    /// A sample landing just after `end_time` (interval granularity) is
    /// kept in [`readings`](Self::readings) but excluded here.
    pub fn in_window(&self) -> impl Iterator<Item = &SampleReading> {
        self.readings
            .iter()
            .filter(move |r| r.timestamp >= self.start_time && r.timestamp <= self.end_time)
    }
}

/// Normalized output of one backend generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub response_text: String,
    /// Completion tokens. Some backends do not report this.
    pub token_count: Option<u64>,
    pub prompt_token_count: Option<u64>,
    /// Backend-reported total duration, or the client round-trip when the
    /// backend reports none.
    pub raw_latency_seconds: f64,
    pub load_duration_seconds: Option<f64>,
    pub eval_duration_seconds: Option<f64>,
}

impl GenerationResult {
    /// A result carrying only text and latency, as a minimal backend would
    /// produce.
    pub fn text_only(response_text: impl Into<String>, raw_latency_seconds: f64) -> Self {
        Self {
            response_text: response_text.into(),
            token_count: None,
            prompt_token_count: None,
            raw_latency_seconds,
            load_duration_seconds: None,
            eval_duration_seconds: None,
        }
    }
}

/// Outcome of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Everything a run yields besides its features.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Prompt text sent to the backend.
    pub prompt: String,
    pub status: RunStatus,
    pub error: Option<String>,
    /// `None` unless the run succeeded.
    pub response_text: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(prompt: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            status: RunStatus::Ok,
            error: None,
            response_text: Some(response_text.into()),
        }
    }

    pub fn failed(prompt: impl Into<String>, status: RunStatus, error: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            status,
            error: Some(error.into()),
            response_text: None,
        }
    }
}

/// Flat record for one (model, prompt, iteration) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    #[serde(flatten)]
    pub identity: RunIdentity,
    pub prompt: String,
    pub status: RunStatus,
    /// Backend or timeout message for failed runs.
    pub error: Option<String>,
    /// Generated text; `null` for failed and timed-out runs.
    pub response_text: Option<String>,
    #[serde(flatten)]
    pub features: FeatureMap,
}

impl MetricRecord {
    /// Look up a feature value; `None` both for "no data" and unknown names.
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied().flatten()
    }
}

/// Succeeded / failed counts over a completed matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl RunSummary {
    /// Runs that did not produce generation data (failed or timed out).
    pub fn failed_run_count(&self) -> usize {
        self.failed + self.timed_out
    }

    /// `true` when the matrix was non-empty and no run succeeded.
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.succeeded == 0
    }
}
