//! NVML-based GPU sampling.
//!
//! [`GpuSampler`] wraps a [`GpuBackend`] (NVML in production) and reports
//! host-wide GPU load and VRAM usage.
//!
//! Backend initialisation is **attempted exactly once** -- if the host has
//! no NVIDIA drivers (e.g. a developer laptop), the sampler logs a warning
//! and stays disabled for the rest of the process instead of failing the
//! run or retrying on every tick.

use std::fmt;

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;

use crate::sampler::{MetricSampler, Reading, SamplerKind};

/// Aggregated GPU reading across every readable device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuReading {
    /// Mean compute utilization across devices (0-100).
    pub load_percent: f64,
    /// Summed VRAM used over summed VRAM total, as a percentage.
    pub mem_percent: f64,
}

/// Errors from a GPU backend.
#[derive(Debug, thiserror::Error)]
pub enum GpuReadError {
    #[error("NVML error: {0}")]
    Nvml(#[from] NvmlError),

    #[error("No GPU device could be read")]
    NoDevices,
}

/// Source of GPU readings. Implemented by [`NvmlBackend`]; tests supply
/// their own.
pub trait GpuBackend: Send + Sync {
    fn read(&self) -> Result<GpuReading, GpuReadError>;
}

/// Per-device values before aggregation.
struct DeviceSnapshot {
    utilization_percent: u32,
    vram_used: u64,
    vram_total: u64,
}

/// NVML handle plus the device count found at initialisation.
pub struct NvmlBackend {
    nvml: Nvml,
    device_count: u32,
}

impl NvmlBackend {
    /// Initialise NVML and count devices. Zero devices counts as
    /// unavailable.
    pub fn init() -> Result<Self, GpuReadError> {
        let nvml = Nvml::init()?;
        let device_count = nvml.device_count()?;
        if device_count == 0 {
            return Err(GpuReadError::NoDevices);
        }

        tracing::info!(gpu_count = device_count, "NVML initialised successfully");
        Ok(Self { nvml, device_count })
    }

    fn read_device(&self, idx: u32) -> Result<DeviceSnapshot, NvmlError> {
        let device = self.nvml.device_by_index(idx)?;
        let mem_info = device.memory_info()?;
        let utilization = device.utilization_rates()?;

        Ok(DeviceSnapshot {
            utilization_percent: utilization.gpu,
            vram_used: mem_info.used,
            vram_total: mem_info.total,
        })
    }
}

impl GpuBackend for NvmlBackend {
    /// Errors on individual devices are logged and the device is skipped;
    /// the read only fails when no device could be read at all.
    fn read(&self) -> Result<GpuReading, GpuReadError> {
        let mut snapshots = Vec::with_capacity(self.device_count as usize);

        for idx in 0..self.device_count {
            match self.read_device(idx) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    tracing::debug!(gpu_index = idx, error = %e, "Skipping GPU -- read failed");
                }
            }
        }

        aggregate(&snapshots).ok_or(GpuReadError::NoDevices)
    }
}

/// Combine device snapshots into one host-wide reading.
fn aggregate(snapshots: &[DeviceSnapshot]) -> Option<GpuReading> {
    if snapshots.is_empty() {
        return None;
    }

    let load_sum: f64 = snapshots
        .iter()
        .map(|s| f64::from(s.utilization_percent))
        .sum();
    let used: u64 = snapshots.iter().map(|s| s.vram_used).sum();
    let total: u64 = snapshots.iter().map(|s| s.vram_total).sum();

    let mem_percent = if total == 0 {
        0.0
    } else {
        used as f64 * 100.0 / total as f64
    };

    Some(GpuReading {
        load_percent: load_sum / snapshots.len() as f64,
        mem_percent,
    })
}

/// GPU sampler that degrades to "no data" when no GPU is usable.
pub struct GpuSampler {
    /// `None` when initialisation failed (no drivers / no GPU).
    backend: Option<Box<dyn GpuBackend>>,
}

impl Default for GpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuSampler {
    /// Attempt to initialise NVML.
    pub fn new() -> Self {
        Self::from_init(NvmlBackend::init)
    }

    /// Run `init` once; on failure the sampler is permanently disabled.
    pub fn from_init<B, E, F>(init: F) -> Self
    where
        B: GpuBackend + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<B, E>,
    {
        match init() {
            Ok(backend) => Self {
                backend: Some(Box::new(backend)),
            },
            Err(e) => {
                tracing::warn!(error = %e, "GPU unavailable -- GPU metrics will not be collected");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }
}

impl MetricSampler for GpuSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Gpu
    }

    fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn sample(&self) -> Option<Reading> {
        let backend = self.backend.as_ref()?;
        match backend.read() {
            Ok(reading) => Some(Reading::Gpu {
                load_percent: reading.load_percent,
                mem_percent: reading.mem_percent,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "GPU sample dropped");
                None
            }
        }
    }
}
