//! Model backend seam.
//!
//! Defines [`ModelClient`], the trait every backend implementation
//! satisfies, and [`BackendError`], the per-run failure it reports.

use std::future::Future;

use crate::types::GenerationResult;

/// Generation options forwarded opaquely to the backend
/// (e.g. `{"temperature": 0.7, "num_predict": 256}`).
pub type GenerationOptions = serde_json::Map<String, serde_json::Value>;

/// A failed generation call. Always a per-run failure, never fatal on its own.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached (connection refused, DNS, reset).
    #[error("Backend unreachable: {0}")]
    Connection(String),

    /// The backend does not know the requested model.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The backend answered with a non-success status.
    #[error("Backend error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The backend answered but the payload could not be interpreted.
    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

/// Issues one blocking generation request.
///
/// Implementations apply no timeout of their own; the orchestrator bounds
/// the call when a run timeout is configured and drops the future if it
/// expires.
pub trait ModelClient: Send + Sync {
    fn generate(
        &self,
        model_name: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<GenerationResult, BackendError>> + Send;
}
