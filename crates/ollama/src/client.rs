//! REST client for the Ollama generation endpoint.
//!
//! Sends non-streaming `POST /api/generate` requests with [`reqwest`] and
//! normalizes the response into a
//! [`GenerationResult`](lminsight_core::types::GenerationResult).

use std::time::Instant;

use lminsight_core::client::{BackendError, GenerationOptions, ModelClient};
use lminsight_core::types::GenerationResult;
use serde::{Deserialize, Serialize};

/// Address of a locally running Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Port Ollama listens on when none is given.
pub const DEFAULT_PORT: u16 = 11434;

/// Environment variable Ollama itself uses for its listen address.
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// HTTP client for a single Ollama instance.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

/// Body of `POST /api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    options: &'a GenerationOptions,
}

/// Subset of the `/api/generate` response the pipeline uses. Durations are
/// nanoseconds; every counter is optional since not all servers send them.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    load_duration: Option<u64>,
    #[serde(default)]
    eval_duration: Option<u64>,
}

impl GenerateResponse {
    fn into_result(self, round_trip_seconds: f64) -> GenerationResult {
        GenerationResult {
            response_text: self.response,
            token_count: self.eval_count,
            prompt_token_count: self.prompt_eval_count,
            raw_latency_seconds: self
                .total_duration
                .map(nanos_to_seconds)
                .unwrap_or(round_trip_seconds),
            load_duration_seconds: self.load_duration.map(nanos_to_seconds),
            eval_duration_seconds: self.eval_duration.map(nanos_to_seconds),
        }
    }
}

fn nanos_to_seconds(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_SECOND
}

/// Accept `host`, `host:port` and full URLs, the way `OLLAMA_HOST` is
/// commonly written. A missing scheme becomes `http`; a missing port
/// becomes [`DEFAULT_PORT`].
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    if has_port(authority) {
        format!("{scheme}://{authority}{path}")
    } else {
        format!("{scheme}://{authority}:{DEFAULT_PORT}{path}")
    }
}

/// `true` when the authority ends in `:<digits>`. Bracketed IPv6 literals
/// only count a port after the closing bracket.
fn has_port(authority: &str) -> bool {
    let host_end = authority.rfind(']').map_or(0, |idx| idx + 1);
    match authority[host_end..].rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Precedence for the base URL. Blank values count as unset.
fn choose_base_url(explicit: Option<&str>, env_host: Option<&str>) -> String {
    explicit
        .into_iter()
        .chain(env_host)
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .to_string()
}

impl OllamaClient {
    /// Create a client for an Ollama instance.
    ///
    /// * `base_url` - e.g. `http://localhost:11434` or `localhost:11434`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize_base_url(base_url),
        }
    }

    /// Resolve the base URL from an explicit value, then `OLLAMA_HOST`,
    /// then [`DEFAULT_BASE_URL`].
    pub fn resolve(explicit: Option<&str>) -> Self {
        let env_host = std::env::var(OLLAMA_HOST_ENV).ok();
        Self::new(&choose_base_url(explicit, env_host.as_deref()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// Map a non-success response to the matching [`BackendError`].
    async fn ensure_success(
        response: reqwest::Response,
        model_name: &str,
    ) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound(format!("{model_name}: {body}")));
        }
        Err(BackendError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

impl ModelClient for OllamaClient {
    async fn generate(
        &self,
        model_name: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, BackendError> {
        let request = GenerateRequest {
            model: model_name,
            prompt,
            stream: false,
            options,
        };

        let started = Instant::now();

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let response = Self::ensure_success(response, model_name).await?;

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let round_trip = started.elapsed().as_secs_f64();

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Malformed(format!("{e}: {body}")))?;

        tracing::debug!(
            model = model_name,
            eval_count = ?parsed.eval_count,
            round_trip_ms = (round_trip * 1000.0) as u64,
            "Generation completed",
        );

        Ok(parsed.into_result(round_trip))
    }
}
