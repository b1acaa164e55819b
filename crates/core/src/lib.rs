//! Domain model and pure measurement logic for `lminsight`.
//!
//! Everything in this crate is free of network and OS-metric access so it
//! can be tested in isolation. Samplers live in `lminsight-monitor`, the
//! backend client in `lminsight-ollama`, and orchestration in
//! `lminsight-pipeline`.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod features;
pub mod matrix;
pub mod metric_names;
pub mod types;
