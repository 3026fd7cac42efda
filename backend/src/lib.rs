//! Device backends for the veld runtime.
//!
//! A [`Backend`] owns a fixed set of [`Device`]s and knows how to compile a
//! [`Computation`] into an executable [`Program`]. Three backends exist,
//! one per platform: [`CpuBackend`], [`GpuBackend`] and [`TpuBackend`].
//! All of them execute through the same interpreter; what differs is the
//! device layout convention, the allocator policy and fingerprint support.
//!
//! The upper client layer never touches raw memory directly — it goes
//! through [`DeviceMemory`] handles handed out by a device's [`Allocator`].

pub mod backend;
pub mod computation;
pub mod device;
pub mod error;
pub mod memory;
pub mod program;
pub mod queue;
pub mod sync;


pub use backend::{Backend, CpuBackend, GpuBackend, GpuOptions, Platform, TpuBackend};
pub use computation::{BuildOptions, CompileOptions, Computation, Op};
pub use device::{Device, DeviceId, LayoutConvention};
pub use error::{Error, Result};
pub use memory::{AllocationStats, Allocator, DeviceMemory, GpuAllocator, GpuAllocatorKind, HostAllocator};
pub use program::Program;
pub use queue::TransferQueue;
pub use sync::ReadyEvent;
