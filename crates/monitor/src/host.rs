//! CPU and RAM samplers backed by `sysinfo`.
//!
//! Platform support is checked once at construction. On an unsupported
//! platform the sampler logs a warning and stays disabled instead of
//! retrying on every tick.

use std::sync::Mutex;

use sysinfo::System;

use crate::sampler::{MetricSampler, Reading, SamplerKind};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Host-wide CPU utilization and normalized 1-minute load average.
pub struct CpuSampler {
    /// `None` when the platform is not supported by `sysinfo`.
    system: Option<Mutex<System>>,
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler {
    pub fn new() -> Self {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            tracing::warn!("Platform not supported -- CPU metrics will not be collected");
            return Self { system: None };
        }

        // Usage is computed between two refreshes; prime the first one so
        // the first real sample is meaningful.
        let mut system = System::new();
        system.refresh_cpu_usage();

        Self {
            system: Some(Mutex::new(system)),
        }
    }
}

impl MetricSampler for CpuSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Cpu
    }

    fn is_enabled(&self) -> bool {
        self.system.is_some()
    }

    fn sample(&self) -> Option<Reading> {
        let mut system = self.system.as_ref()?.lock().ok()?;
        system.refresh_cpu_usage();

        let percent = f64::from(system.global_cpu_usage());
        if !percent.is_finite() {
            tracing::debug!("CPU usage read returned a non-finite value");
            return None;
        }

        let cores = system.cpus().len();
        let load_1m_normalized = if cfg!(windows) || cores == 0 {
            None
        } else {
            Some(System::load_average().one / cores as f64)
        };

        Some(Reading::Cpu {
            percent,
            load_1m_normalized,
        })
    }
}

/// Used RAM as a percentage and in GB.
pub struct RamSampler {
    system: Option<Mutex<System>>,
}

impl Default for RamSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RamSampler {
    pub fn new() -> Self {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            tracing::warn!("Platform not supported -- RAM metrics will not be collected");
            return Self { system: None };
        }

        Self {
            system: Some(Mutex::new(System::new())),
        }
    }
}

impl MetricSampler for RamSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Ram
    }

    fn is_enabled(&self) -> bool {
        self.system.is_some()
    }

    fn sample(&self) -> Option<Reading> {
        let mut system = self.system.as_ref()?.lock().ok()?;
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            tracing::debug!("RAM read reported zero total memory");
            return None;
        }
        let used = system.used_memory();

        Some(Reading::Ram {
            percent: used as f64 * 100.0 / total as f64,
            used_gb: used as f64 / BYTES_PER_GB,
        })
    }
}
