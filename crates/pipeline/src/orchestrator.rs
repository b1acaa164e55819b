//! Sequential execution of the run matrix.
//!
//! For each cell the [`Orchestrator`] resolves the model's options, wraps
//! the backend call in a sampling session, extracts both feature maps, and
//! appends the merged record. Backend failures and timeouts degrade the
//! record; only aggregation errors stop the loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lminsight_core::aggregate::MetricsAggregator;
use lminsight_core::client::{BackendError, GenerationOptions, ModelClient};
use lminsight_core::config::BenchConfig;
use lminsight_core::error::BenchError;
use lminsight_core::features::{generation, system};
use lminsight_core::matrix::RunMatrix;
use lminsight_core::types::{GenerationResult, RunIdentity, RunOutcome, RunStatus};
use lminsight_monitor::sampler::SamplerSet;
use lminsight_monitor::session::{run_sampled, DEFAULT_SAMPLING_INTERVAL};

/// Per-pipeline settings the orchestrator needs from the configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub sampling_interval: Duration,
    /// Abandon a backend call after this long. `None` waits indefinitely.
    pub run_timeout: Option<Duration>,
    /// Options used for models without an entry in `model_options`.
    pub default_options: GenerationOptions,
    /// Fully resolved options per model.
    pub model_options: HashMap<String, GenerationOptions>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            run_timeout: None,
            default_options: GenerationOptions::new(),
            model_options: HashMap::new(),
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &BenchConfig) -> Self {
        let model_options = config
            .models
            .iter()
            .map(|model| (model.clone(), config.options_for(model)))
            .collect();

        Self {
            sampling_interval: config.sampling_interval(),
            run_timeout: config.run_timeout(),
            default_options: config.options.clone(),
            model_options,
        }
    }

    fn options_for(&self, model: &str) -> &GenerationOptions {
        self.model_options
            .get(model)
            .unwrap_or(&self.default_options)
    }
}

/// Why a single run produced no generation result.
#[derive(Debug)]
enum RunFailure {
    Backend(BackendError),
    TimedOut(Duration),
}

impl RunFailure {
    fn status(&self) -> RunStatus {
        match self {
            Self::Backend(_) => RunStatus::Failed,
            Self::TimedOut(_) => RunStatus::TimedOut,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Backend(e) => e.to_string(),
            Self::TimedOut(limit) => format!("Run timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// Drives the run matrix against one backend.
pub struct Orchestrator<C> {
    client: C,
    samplers: Arc<SamplerSet>,
    settings: RunSettings,
}

impl<C: ModelClient> Orchestrator<C> {
    pub fn new(client: C, samplers: Arc<SamplerSet>, settings: RunSettings) -> Self {
        Self {
            client,
            samplers,
            settings,
        }
    }

    /// Execute every cell of `matrix` in order and collect the records.
    ///
    /// `prompts` must hold exactly `matrix.prompt_count()` entries, indexed
    /// by `prompt_index`.
    pub async fn run(
        &self,
        matrix: &RunMatrix,
        prompts: &[String],
    ) -> Result<MetricsAggregator, BenchError> {
        if prompts.len() != matrix.prompt_count() {
            return Err(BenchError::config(format!(
                "run matrix expects {} prompts but {} were given",
                matrix.prompt_count(),
                prompts.len()
            )));
        }

        let total = matrix.len();
        let mut aggregator = MetricsAggregator::new();

        tracing::info!(
            runs = total,
            models = matrix.model_count(),
            prompts = matrix.prompt_count(),
            iterations = matrix.iterations(),
            "Starting benchmark",
        );

        for (n, identity) in matrix.cells().iter().enumerate() {
            tracing::info!(
                model = %identity.model_name,
                prompt_index = identity.prompt_index,
                iteration = identity.iteration_index,
                run = n + 1,
                total,
                "Running",
            );

            self.run_one(identity, &prompts[identity.prompt_index], &mut aggregator)
                .await?;
        }

        let summary = aggregator.summary();
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "Benchmark finished",
        );

        Ok(aggregator)
    }

    async fn run_one(
        &self,
        identity: &RunIdentity,
        prompt: &str,
        aggregator: &mut MetricsAggregator,
    ) -> Result<(), BenchError> {
        let options = self.settings.options_for(&identity.model_name);

        let call = self.bounded_generate(&identity.model_name, prompt, options);
        let (call_result, session) = run_sampled(
            Arc::clone(&self.samplers),
            self.settings.sampling_interval,
            call,
        )
        .await;

        let (result, outcome) = match call_result {
            Ok(result) => {
                let outcome = RunOutcome::succeeded(prompt, result.response_text.as_str());
                (Some(result), outcome)
            }
            Err(failure) => {
                tracing::warn!(
                    model = %identity.model_name,
                    prompt_index = identity.prompt_index,
                    iteration = identity.iteration_index,
                    status = failure.status().as_str(),
                    error = %failure.message(),
                    "Run failed -- recording without generation metrics",
                );
                let outcome = RunOutcome::failed(prompt, failure.status(), failure.message());
                (None, outcome)
            }
        };

        let generation =
            generation::extract(result.as_ref(), session.start_time(), session.end_time());
        let system = system::extract(&session);

        let record = aggregator.record(identity.clone(), outcome, generation, system)?;

        tracing::debug!(
            model = %record.identity.model_name,
            prompt_index = record.identity.prompt_index,
            iteration = record.identity.iteration_index,
            samples = session.readings().len(),
            "Run recorded",
        );

        Ok(())
    }

    /// The backend call, bounded by the run timeout when one is set.
    ///
    /// On timeout the inner future is dropped, which abandons the request.
    async fn bounded_generate(
        &self,
        model_name: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, RunFailure> {
        let call = self.client.generate(model_name, prompt, options);

        match self.settings.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(RunFailure::Backend),
                Err(_) => Err(RunFailure::TimedOut(limit)),
            },
            None => call.await.map_err(RunFailure::Backend),
        }
    }
}
