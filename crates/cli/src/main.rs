use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lminsight_core::matrix::RunMatrix;
use lminsight_core::types::RunSummary;
use lminsight_monitor::sampler::SamplerSet;
use lminsight_ollama::OllamaClient;
use lminsight_pipeline::report::{
    prepare_output_dir, renderers_from_names, run_directory, write_artifacts,
};
use lminsight_pipeline::{Orchestrator, RunSettings};

mod args;

use args::Cli;

/// Targets of every workspace crate, filtered together.
const LOG_TARGETS: &[&str] = &[
    "lminsight",
    "lminsight_core",
    "lminsight_pipeline",
    "lminsight_monitor",
    "lminsight_ollama",
];

/// Every run failed; records were still written.
const EXIT_ALL_FAILED: u8 = 1;
/// Configuration, aggregation or output error; the pipeline aborted.
const EXIT_ABORTED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // --- Tracing ---
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(summary) if summary.all_failed() => {
            tracing::error!(total = summary.total, "Every run failed");
            ExitCode::from(EXIT_ALL_FAILED)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Benchmark aborted");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

/// `RUST_LOG`-style directive enabling `level` for every workspace crate.
fn default_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    // --- Configuration ---
    let config = cli.load_config()?;
    config.validate()?;
    let prompts = config.resolve_prompts()?;
    let renderers = renderers_from_names(&config.reports)?;

    tracing::info!(
        models = ?config.models,
        prompts = prompts.len(),
        iterations = config.iterations,
        interval_ms = config.sampling_interval_ms,
        timeout_secs = ?config.run_timeout_secs,
        "Loaded benchmark configuration",
    );

    let output_dir = run_directory(&config.output_dir, &config.models, chrono::Local::now());
    prepare_output_dir(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    // --- Samplers ---
    let samplers = Arc::new(SamplerSet::detect());

    // --- Backend ---
    let client = OllamaClient::resolve(config.backend_url.as_deref());
    tracing::info!(base_url = %client.base_url(), "Using Ollama backend");

    // --- Runs ---
    let matrix = RunMatrix::build(&config.models, prompts.len(), config.iterations);
    let orchestrator = Orchestrator::new(client, samplers, RunSettings::from_config(&config));
    let aggregator = orchestrator.run(&matrix, &prompts).await?;
    let summary = aggregator.summary();

    // --- Reports ---
    let written = write_artifacts(&output_dir, &renderers, aggregator.records())
        .with_context(|| format!("writing reports to {}", output_dir.display()))?;

    tracing::info!(
        dir = %output_dir.display(),
        files = written.len(),
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        timed_out = summary.timed_out,
        "Results saved",
    );

    Ok(summary)
}
