//! Backend implementations, one per platform.

use std::sync::Arc;

use crate::computation::{CompileOptions, Computation};
use crate::device::{Device, DeviceId, LayoutConvention};
use crate::error::{InvalidOptionsSnafu, Result};
use crate::memory::{GpuAllocator, GpuAllocatorKind, HostAllocator};
use crate::program::{Program, compile_interpreter};

/// Platform class of a backend. A closed set: the client layer dispatches
/// on the trait, never on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Platform {
    #[strum(serialize = "CPU")]
    Cpu,
    #[strum(serialize = "GPU")]
    Gpu,
    #[strum(serialize = "TPU")]
    Tpu,
}

/// A compute backend: a fixed device topology plus a compiler.
///
/// Every implementation satisfies the same contract — resolve devices,
/// compile computations, report fingerprints — so the client layer is
/// backend-agnostic.
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn platform(&self) -> Platform;

    fn devices(&self) -> &[Arc<Device>];

    fn device_count(&self) -> usize {
        self.devices().len()
    }

    /// Resolve a device id. Ids are dense, starting at 0.
    fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices().get(id).cloned()
    }

    fn compile(
        &self,
        computation: &Computation,
        options: &CompileOptions,
    ) -> Result<Arc<dyn Program>>;

    /// Backend-assigned identity string for a compiled program, if this
    /// backend supports fingerprinting. Absence is not an error.
    fn fingerprint(&self, program: &dyn Program) -> Option<String>;
}

/// Host-CPU backend: row-major devices, plain host allocator.
#[derive(Debug)]
pub struct CpuBackend {
    devices: Vec<Arc<Device>>,
}

impl CpuBackend {
    pub fn new() -> Result<Self> {
        let allocator = Arc::new(HostAllocator::new("CPU"));
        let device = Device::new(0, Platform::Cpu, allocator, LayoutConvention::RowMajor);
        Ok(Self { devices: vec![Arc::new(device)] })
    }
}

impl Backend for CpuBackend {
    fn platform(&self) -> Platform {
        Platform::Cpu
    }

    fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    fn compile(
        &self,
        computation: &Computation,
        options: &CompileOptions,
    ) -> Result<Arc<dyn Program>> {
        compile_interpreter(computation, options)
    }

    fn fingerprint(&self, program: &dyn Program) -> Option<String> {
        Some(format!("cpu-{:016x}", program.digest()))
    }
}

/// GPU client construction options.
#[derive(Debug, Clone, bon::Builder)]
pub struct GpuOptions {
    /// Fraction of device memory the client may use, in `(0, 1]`.
    #[builder(default = 0.9)]
    pub memory_fraction: f64,

    /// Reserve the whole budget up front instead of growing on demand.
    #[builder(default = true)]
    pub preallocate: bool,

    #[builder(default)]
    pub allocator: GpuAllocatorKind,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// GPU backend: column-major devices behind a fraction-budgeted allocator.
#[derive(Debug)]
pub struct GpuBackend {
    devices: Vec<Arc<Device>>,
    options: GpuOptions,
}

impl GpuBackend {
    /// Initialize the backend, or fail with the configuration error — a
    /// half-initialized backend is never returned.
    pub fn new(options: GpuOptions) -> Result<Self> {
        snafu::ensure!(
            options.memory_fraction > 0.0 && options.memory_fraction <= 1.0,
            InvalidOptionsSnafu {
                reason: format!(
                    "memory_fraction must be in (0, 1], got {}",
                    options.memory_fraction
                ),
            }
        );

        let allocator = Arc::new(GpuAllocator::new(
            options.memory_fraction,
            options.preallocate,
            options.allocator,
        ));
        let device = Device::new(0, Platform::Gpu, allocator, LayoutConvention::ColumnMajor);
        Ok(Self { devices: vec![Arc::new(device)], options })
    }

    pub fn options(&self) -> &GpuOptions {
        &self.options
    }
}

impl Backend for GpuBackend {
    fn platform(&self) -> Platform {
        Platform::Gpu
    }

    fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    fn compile(
        &self,
        computation: &Computation,
        options: &CompileOptions,
    ) -> Result<Arc<dyn Program>> {
        compile_interpreter(computation, options)
    }

    fn fingerprint(&self, program: &dyn Program) -> Option<String> {
        Some(format!("gpu-{:016x}", program.digest()))
    }
}

/// TPU backend: column-major devices, host allocator, no fingerprint
/// support.
#[derive(Debug)]
pub struct TpuBackend {
    devices: Vec<Arc<Device>>,
}

impl TpuBackend {
    pub fn new() -> Result<Self> {
        let allocator = Arc::new(HostAllocator::new("TPU"));
        let device = Device::new(0, Platform::Tpu, allocator, LayoutConvention::ColumnMajor);
        Ok(Self { devices: vec![Arc::new(device)] })
    }
}

impl Backend for TpuBackend {
    fn platform(&self) -> Platform {
        Platform::Tpu
    }

    fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    fn compile(
        &self,
        computation: &Computation,
        options: &CompileOptions,
    ) -> Result<Arc<dyn Program>> {
        compile_interpreter(computation, options)
    }

    fn fingerprint(&self, _program: &dyn Program) -> Option<String> {
        None
    }
}
