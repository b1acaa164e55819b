//! `lminsight-monitor` -- host resource sampling.
//!
//! Samplers for CPU, RAM, and GPU plus the per-run sampling session that
//! polls them in the background while a model call is in flight.

pub mod gpu;
pub mod host;
pub mod sampler;
pub mod session;
