//! Sampler capability and the set of samplers polled each tick.

use lminsight_core::types::SampleReading;
use tokio::time::Instant;

use crate::gpu::GpuSampler;
use crate::host::{CpuSampler, RamSampler};

/// Which host facility a sampler reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Cpu,
    Ram,
    Gpu,
}

/// One instantaneous value set from a single sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Cpu {
        percent: f64,
        /// Not every platform reports a load average.
        load_1m_normalized: Option<f64>,
    },
    Ram {
        percent: f64,
        used_gb: f64,
    },
    Gpu {
        load_percent: f64,
        mem_percent: f64,
    },
}

impl Reading {
    /// Write this reading's columns into a combined sample.
    pub fn apply_to(self, sample: &mut SampleReading) {
        match self {
            Self::Cpu {
                percent,
                load_1m_normalized,
            } => {
                sample.cpu_percent = Some(percent);
                sample.cpu_load_1m_normalized = load_1m_normalized;
            }
            Self::Ram { percent, used_gb } => {
                sample.ram_percent = Some(percent);
                sample.ram_used_gb = Some(used_gb);
            }
            Self::Gpu {
                load_percent,
                mem_percent,
            } => {
                sample.gpu_load_percent = Some(load_percent);
                sample.gpu_mem_percent = Some(mem_percent);
            }
        }
    }
}

/// A source of an instantaneous resource reading.
///
/// `sample` must be cheap and must not block: it runs on the sampling task
/// while the model call is in flight. `None` means no reading for this
/// call, either because the sampler is permanently disabled or because a
/// single read failed.
pub trait MetricSampler: Send + Sync {
    fn kind(&self) -> SamplerKind;

    /// `false` once the underlying facility was found unavailable.
    fn is_enabled(&self) -> bool;

    fn sample(&self) -> Option<Reading>;
}

/// All samplers polled on each tick of a session.
pub struct SamplerSet {
    samplers: Vec<Box<dyn MetricSampler>>,
}

impl SamplerSet {
    pub fn new(samplers: Vec<Box<dyn MetricSampler>>) -> Self {
        Self { samplers }
    }

    /// CPU, RAM, and GPU samplers for this host.
    ///
    /// Each is checked once here; unavailable facilities are disabled for
    /// the lifetime of the process.
    pub fn detect() -> Self {
        let set = Self::new(vec![
            Box::new(CpuSampler::new()),
            Box::new(RamSampler::new()),
            Box::new(GpuSampler::new()),
        ]);

        tracing::info!(
            enabled = ?set.enabled_kinds(),
            "Sampler detection complete",
        );
        set
    }

    pub fn enabled_kinds(&self) -> Vec<SamplerKind> {
        self.samplers
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.kind())
            .collect()
    }

    /// Poll every sampler once and merge the results.
    ///
    /// Returns `None` when no sampler produced data, so a tick where every
    /// read failed is dropped instead of recorded as an empty reading.
    pub fn read_all(&self, timestamp: Instant) -> Option<SampleReading> {
        let mut sample = SampleReading::empty(timestamp);
        for sampler in &self.samplers {
            if let Some(reading) = sampler.sample() {
                reading.apply_to(&mut sample);
            }
        }
        sample.has_data().then_some(sample)
    }
}
