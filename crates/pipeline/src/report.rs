//! Rendering the record collection into output artifacts.
//!
//! Every output format is a [`Renderer`]. The active set is chosen by name
//! from configuration; each renderer turns the full record list into one
//! [`Artifact`] written under the run's output directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use lminsight_core::error::BenchError;
use lminsight_core::metric_names::{
    avg_feature, peak_feature, COLUMN_CPU_PERCENT, COLUMN_RAM_PERCENT, FEATURE_LATENCY_SECONDS,
    FEATURE_TOKENS_PER_SECOND, RESERVED_COLUMNS,
};
use lminsight_core::types::MetricRecord;

/// Errors while rendering or writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// Turns the complete record collection into a single artifact.
pub trait Renderer: Send + Sync {
    /// Name used to select this renderer in configuration.
    fn name(&self) -> &'static str;

    fn render(&self, records: &[MetricRecord]) -> Result<Artifact, ReportError>;
}

impl std::fmt::Debug for dyn Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").field("name", &self.name()).finish()
    }
}

/// Names accepted by [`renderers_from_names`].
pub const RENDERER_NAMES: &[&str] = &["json", "csv", "table"];

/// Build the active renderers. An unknown name is a configuration error,
/// raised before any run executes.
pub fn renderers_from_names(names: &[String]) -> Result<Vec<Box<dyn Renderer>>, BenchError> {
    let mut seen = BTreeSet::new();
    let mut renderers: Vec<Box<dyn Renderer>> = Vec::with_capacity(names.len());

    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let renderer: Box<dyn Renderer> = match name.as_str() {
            "json" => Box::new(JsonRenderer),
            "csv" => Box::new(CsvRenderer),
            "table" => Box::new(TableRenderer),
            other => {
                return Err(BenchError::config(format!(
                    "unknown report '{other}' (expected one of: {})",
                    RENDERER_NAMES.join(", ")
                )))
            }
        };
        renderers.push(renderer);
    }

    Ok(renderers)
}

/// Directory for one pipeline invocation:
/// `<output_dir>/<model-model>_<YYYYmmdd_HHMMSS>`.
pub fn run_directory(output_dir: &Path, models: &[String], now: DateTime<Local>) -> PathBuf {
    let label = models
        .iter()
        .map(|m| sanitize(m))
        .collect::<Vec<_>>()
        .join("-");
    output_dir.join(format!("{label}_{}", now.format("%Y%m%d_%H%M%S")))
}

/// Keep a model name usable as a path component (`llama3.2:latest` ->
/// `llama3.2_latest`).
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Create the run directory, including missing parents.
pub fn prepare_output_dir(dir: &Path) -> Result<(), ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// Render every artifact and write it into `dir`, creating it if needed.
///
/// Returns the written paths in renderer order.
pub fn write_artifacts(
    dir: &Path,
    renderers: &[Box<dyn Renderer>],
    records: &[MetricRecord],
) -> Result<Vec<PathBuf>, ReportError> {
    prepare_output_dir(dir)?;

    let mut written = Vec::with_capacity(renderers.len());
    for renderer in renderers {
        let artifact = renderer.render(records)?;
        let path = dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.contents).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            renderer = renderer.name(),
            path = %path.display(),
            bytes = artifact.contents.len(),
            "Report written",
        );
        written.push(path);
    }

    Ok(written)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Pretty-printed JSON array of flat records.
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, records: &[MetricRecord]) -> Result<Artifact, ReportError> {
        Ok(Artifact {
            file_name: "records.json".to_string(),
            contents: serde_json::to_vec_pretty(records)?,
        })
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// One row per record. "No data" is an empty cell.
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn render(&self, records: &[MetricRecord]) -> Result<Artifact, ReportError> {
        let feature_columns: Vec<&str> = records
            .first()
            .map(|r| r.features.keys().map(String::as_str).collect())
            .unwrap_or_default();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(RESERVED_COLUMNS.iter().chain(feature_columns.iter()))?;

        for record in records {
            let mut row = vec![
                record.identity.model_name.clone(),
                record.identity.prompt_index.to_string(),
                record.identity.iteration_index.to_string(),
                record.prompt.clone(),
                record.status.as_str().to_string(),
                record.error.clone().unwrap_or_default(),
                record.response_text.clone().unwrap_or_default(),
            ];
            row.extend(
                feature_columns
                    .iter()
                    .map(|name| record.feature(name).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }

        let contents = writer.into_inner().map_err(|e| ReportError::Io {
            path: PathBuf::from("records.csv"),
            source: e.into_error(),
        })?;

        Ok(Artifact {
            file_name: "records.csv".to_string(),
            contents,
        })
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Plain-text per-model comparison of the headline metrics.
pub struct TableRenderer;

impl TableRenderer {
    fn columns() -> Vec<String> {
        vec![
            FEATURE_LATENCY_SECONDS.to_string(),
            FEATURE_TOKENS_PER_SECOND.to_string(),
            avg_feature(COLUMN_CPU_PERCENT),
            peak_feature(COLUMN_RAM_PERCENT),
        ]
    }
}

impl Renderer for TableRenderer {
    fn name(&self) -> &'static str {
        "table"
    }

    fn render(&self, records: &[MetricRecord]) -> Result<Artifact, ReportError> {
        let columns = Self::columns();

        // Models in first-seen order.
        let mut models: Vec<&str> = Vec::new();
        for record in records {
            if !models.contains(&record.identity.model_name.as_str()) {
                models.push(&record.identity.model_name);
            }
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Disabled);

        let mut header = vec!["model".to_string(), "runs".to_string(), "ok".to_string()];
        header.extend(columns.iter().cloned());
        table.set_header(header);

        for model in models {
            let rows: Vec<&MetricRecord> = records
                .iter()
                .filter(|r| r.identity.model_name == model)
                .collect();
            let ok = rows.iter().filter(|r| r.status.is_ok()).count();

            let mut row = vec![model.to_string(), rows.len().to_string(), ok.to_string()];
            row.extend(columns.iter().map(|column| {
                mean(rows.iter().filter_map(|r| r.feature(column)))
                    .map(|v| format!("{v:.3}"))
                    .unwrap_or_else(|| "-".to_string())
            }));
            table.add_row(row);
        }

        let mut out = table.to_string();
        out.push('\n');

        Ok(Artifact {
            file_name: "summary.txt".to_string(),
            contents: out.into_bytes(),
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}
