//! Canonical feature and column names.
//!
//! These names form the record schema handed to renderers: every record
//! produced by one pipeline run carries exactly this set of columns, with
//! missing values serialized as `null` (JSON) or an empty cell (CSV).

// ---------------------------------------------------------------------------
// Record columns
// ---------------------------------------------------------------------------

pub const COLUMN_MODEL_NAME: &str = "model_name";
pub const COLUMN_PROMPT_INDEX: &str = "prompt_index";
pub const COLUMN_ITERATION_INDEX: &str = "iteration_index";
pub const COLUMN_PROMPT: &str = "prompt";
pub const COLUMN_STATUS: &str = "status";
pub const COLUMN_ERROR: &str = "error";
pub const COLUMN_RESPONSE_TEXT: &str = "response_text";

/// Columns owned by the record itself. A feature extractor emitting one of
/// these names is an aggregation conflict.
pub const RESERVED_COLUMNS: &[&str] = &[
    COLUMN_MODEL_NAME,
    COLUMN_PROMPT_INDEX,
    COLUMN_ITERATION_INDEX,
    COLUMN_PROMPT,
    COLUMN_STATUS,
    COLUMN_ERROR,
    COLUMN_RESPONSE_TEXT,
];

// ---------------------------------------------------------------------------
// Generation features
// ---------------------------------------------------------------------------

/// Wall-clock seconds between the start and end of the model call.
pub const FEATURE_LATENCY_SECONDS: &str = "latency_seconds";

/// Completion tokens divided by wall-clock latency.
pub const FEATURE_TOKENS_PER_SECOND: &str = "tokens_per_second";

/// Length of the response text in characters.
pub const FEATURE_RESPONSE_LENGTH: &str = "response_length";

pub const FEATURE_COMPLETION_TOKENS: &str = "completion_tokens";
pub const FEATURE_PROMPT_TOKENS: &str = "prompt_tokens";

/// Total duration as reported by the backend (may differ from wall clock).
pub const FEATURE_BACKEND_TOTAL_SECONDS: &str = "backend_total_seconds";

/// Model load time reported by the backend.
pub const FEATURE_LOAD_DURATION_SECONDS: &str = "load_duration_seconds";

/// Completion tokens divided by the backend-reported evaluation duration.
pub const FEATURE_EVAL_TOKENS_PER_SECOND: &str = "eval_tokens_per_second";

/// Distinct lowercase words divided by total words in the response.
pub const FEATURE_UNIQUE_WORDS_RATIO: &str = "unique_words_ratio";

/// Every key emitted by the generation extractor, in emission order.
pub const GENERATION_FEATURES: &[&str] = &[
    FEATURE_LATENCY_SECONDS,
    FEATURE_TOKENS_PER_SECOND,
    FEATURE_RESPONSE_LENGTH,
    FEATURE_COMPLETION_TOKENS,
    FEATURE_PROMPT_TOKENS,
    FEATURE_BACKEND_TOTAL_SECONDS,
    FEATURE_LOAD_DURATION_SECONDS,
    FEATURE_EVAL_TOKENS_PER_SECOND,
    FEATURE_UNIQUE_WORDS_RATIO,
];

// ---------------------------------------------------------------------------
// System sample columns
// ---------------------------------------------------------------------------

/// Host-wide CPU utilization (0-100).
pub const COLUMN_CPU_PERCENT: &str = "cpu_percent";

/// 1-minute load average divided by the logical core count.
pub const COLUMN_CPU_LOAD_1M: &str = "cpu_load_1m_normalized";

/// Used RAM as a percentage of total RAM.
pub const COLUMN_RAM_PERCENT: &str = "ram_percent";

pub const COLUMN_RAM_USED_GB: &str = "ram_used_gb";

/// GPU compute utilization averaged across devices (0-100).
pub const COLUMN_GPU_LOAD_PERCENT: &str = "gpu_load_percent";

/// VRAM used as a percentage of VRAM total, summed across devices.
pub const COLUMN_GPU_MEM_PERCENT: &str = "gpu_mem_percent";

/// Name of the average-over-session feature for a sample column.
pub fn avg_feature(column: &str) -> String {
    format!("avg_{column}")
}

/// Name of the peak-over-session feature for a sample column.
pub fn peak_feature(column: &str) -> String {
    format!("peak_{column}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_feature_names_are_prefixed() {
        assert_eq!(avg_feature(COLUMN_CPU_PERCENT), "avg_cpu_percent");
        assert_eq!(peak_feature(COLUMN_RAM_PERCENT), "peak_ram_percent");
    }

    #[test]
    fn generation_features_do_not_use_reserved_names() {
        for name in GENERATION_FEATURES {
            assert!(!RESERVED_COLUMNS.contains(name), "{name} is reserved");
        }
    }
}
