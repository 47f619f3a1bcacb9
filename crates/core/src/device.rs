//! Device enumeration and heap-budget based tile-size selection.
//!
//! The engine only needs two facts about a device: that it exists, and
//! roughly how much usable memory it has. Both come through [`DeviceQuery`]
//! so hosts and tests can substitute their own source of truth.

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Heap budget assumed when the runtime cannot report one. Deliberately
/// conservative: maps to a 64 px tile.
pub const FALLBACK_HEAP_BUDGET_MB: u32 = 512;

/// Reports available compute devices and their memory budgets.
pub trait DeviceQuery: Send + Sync {
    fn device_count(&self) -> u32;

    /// Usable device memory in megabytes. Fails with [`Error::Device`] for an
    /// unknown device id.
    fn heap_budget_mb(&self, device_id: u32) -> Result<u32>;
}

/// Map a heap budget to a safe default tile size.
///
/// Thresholds are the ones the Real-ESRGAN family has shipped with; tile
/// memory grows roughly quadratically with the edge length.
pub fn tile_size_for_heap_budget(heap_budget_mb: u32) -> u32 {
    if heap_budget_mb > 1900 {
        200
    } else if heap_budget_mb > 550 {
        100
    } else if heap_budget_mb > 190 {
        64
    } else {
        32
    }
}

/// Production [`DeviceQuery`] backed by an ORT CUDA EP availability probe.
///
/// ONNX Runtime does not expose free-memory queries, so the budget is either
/// supplied explicitly by the host (e.g. a `--vram-mb` flag) or falls back to
/// [`FALLBACK_HEAP_BUDGET_MB`].
pub struct ProbedDeviceQuery {
    count: u32,
    budget_mb: Option<u32>,
}

impl ProbedDeviceQuery {
    pub fn new(budget_mb: Option<u32>) -> Self {
        let available = CUDAExecutionProvider::default()
            .is_available()
            .unwrap_or(false);
        if !available {
            warn!("CUDA EP is not available — no GPU devices will be reported");
        }
        let count = if available { 1 } else { 0 };
        debug!(count, ?budget_mb, "Probed compute devices");
        Self { count, budget_mb }
    }

    /// Query with a fixed device count, for hosts that enumerate devices
    /// themselves.
    pub fn with_count(count: u32, budget_mb: Option<u32>) -> Self {
        Self { count, budget_mb }
    }
}

impl DeviceQuery for ProbedDeviceQuery {
    fn device_count(&self) -> u32 {
        self.count
    }

    fn heap_budget_mb(&self, device_id: u32) -> Result<u32> {
        if device_id >= self.count {
            return Err(Error::Device(format!(
                "device {device_id} not found ({} available)",
                self.count
            )));
        }
        Ok(self.budget_mb.unwrap_or(FALLBACK_HEAP_BUDGET_MB))
    }
}
