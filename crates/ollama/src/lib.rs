//! Ollama HTTP backend for the benchmark pipeline.
//!
//! Implements [`ModelClient`](lminsight_core::client::ModelClient) over the
//! Ollama `/api/generate` endpoint using [`reqwest`].

pub mod client;

pub use client::OllamaClient;
