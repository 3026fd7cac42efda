//! Device memory handles and allocators.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{AllocationSnafu, Error, Result};
use crate::sync::ReadyEvent;

/// Live-allocation accounting shared between an allocator and the memory it
/// hands out. Callers use this as the external leak detector: after a run
/// that materializes all of its results, `live_allocations` returns to its
/// pre-run baseline.
#[derive(Debug, Default)]
pub struct AllocationStats {
    live: AtomicUsize,
    bytes: AtomicUsize,
}

impl AllocationStats {
    pub fn live_allocations(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bytes.load(Ordering::Acquire)
    }

    fn on_alloc(&self, size: usize) {
        self.live.fetch_add(1, Ordering::AcqRel);
        self.bytes.fetch_add(size, Ordering::AcqRel);
    }

    /// Atomically claim `size` bytes without exceeding `limit`. A successful
    /// reservation is the allocation's accounting; pair it with
    /// [`DeviceMemory::from_reservation`].
    fn try_reserve(&self, size: usize, limit: usize) -> bool {
        let reserved = self
            .bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bytes| {
                bytes.checked_add(size).filter(|&total| total <= limit)
            })
            .is_ok();
        if reserved {
            self.live.fetch_add(1, Ordering::AcqRel);
        }
        reserved
    }

    fn on_free(&self, size: usize) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.bytes.fetch_sub(size, Ordering::AcqRel);
    }
}

/// A reference-counted handle to one device-resident allocation.
///
/// The backing storage is exclusively owned by the allocation; clones of the
/// handle share it. Release is explicit: a second `release` is an error,
/// never a silent no-op. Dropping the last handle frees storage that was
/// never explicitly released.
#[derive(Debug, Clone)]
pub struct DeviceMemory {
    inner: Arc<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    storage: RwLock<Option<Box<[u8]>>>,
    size: usize,
    ready: ReadyEvent,
    stats: Arc<AllocationStats>,
}

impl Drop for MemoryInner {
    fn drop(&mut self) {
        if self.storage.get_mut().take().is_some() {
            self.stats.on_free(self.size);
        }
    }
}

impl DeviceMemory {
    fn new(size: usize, stats: Arc<AllocationStats>) -> Self {
        stats.on_alloc(size);
        Self::from_reservation(size, stats)
    }

    /// Wrap storage whose accounting was already claimed through
    /// [`AllocationStats::try_reserve`].
    fn from_reservation(size: usize, stats: Arc<AllocationStats>) -> Self {
        let inner = MemoryInner {
            storage: RwLock::new(Some(vec![0u8; size].into_boxed_slice())),
            size,
            ready: ReadyEvent::pending(),
            stats,
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn is_released(&self) -> bool {
        self.inner.storage.read().is_none()
    }

    /// Readiness of the work producing this allocation's contents.
    pub fn ready(&self) -> &ReadyEvent {
        &self.inner.ready
    }

    /// Overwrite the full contents. Used by transfers and by program result
    /// writes, before the allocation is marked ready.
    pub fn fill_from(&self, bytes: &[u8]) -> Result<()> {
        let mut storage = self.inner.storage.write();
        let target = storage.as_mut().ok_or(Error::MemoryReleased)?;
        snafu::ensure!(
            bytes.len() == target.len(),
            crate::error::SizeMismatchSnafu { expected: target.len(), actual: bytes.len() }
        );
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Copy the current contents out to a fresh host buffer.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let storage = self.inner.storage.read();
        storage.as_deref().map(<[u8]>::to_vec).ok_or(Error::MemoryReleased)
    }

    /// Free the backing storage. Fails if already released.
    pub fn release(&self) -> Result<()> {
        let mut storage = self.inner.storage.write();
        match storage.take() {
            Some(_) => {
                self.inner.stats.on_free(self.inner.size);
                Ok(())
            }
            None => Err(Error::MemoryReleased),
        }
    }
}

/// Memory allocation strategy for GPU clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumIter)]
pub enum GpuAllocatorKind {
    /// Backend-chosen strategy.
    #[default]
    Default,
    /// Platform-native allocator.
    Platform,
    /// Best-fit-with-coalescing pool.
    Bfc,
}

/// Allocates device memory and tracks what is live.
pub trait Allocator: Send + Sync + std::fmt::Debug {
    /// Allocate `size` zero-initialized bytes. The returned handle starts
    /// in the pending-readiness state.
    fn alloc(&self, size: usize) -> Result<DeviceMemory>;

    fn stats(&self) -> &AllocationStats;

    fn name(&self) -> &str;
}

/// Host-memory allocator used by CPU and TPU devices.
#[derive(Debug)]
pub struct HostAllocator {
    name: &'static str,
    stats: Arc<AllocationStats>,
}

impl HostAllocator {
    pub fn new(name: &'static str) -> Self {
        Self { name, stats: Arc::new(AllocationStats::default()) }
    }
}

impl Allocator for HostAllocator {
    fn alloc(&self, size: usize) -> Result<DeviceMemory> {
        Ok(DeviceMemory::new(size, Arc::clone(&self.stats)))
    }

    fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Size of the simulated GPU memory pool the fraction limit applies to.
pub(crate) const SIMULATED_DEVICE_POOL: usize = 1 << 30;

/// GPU allocator with a byte budget derived from the client's memory
/// fraction. Allocation past the budget fails instead of spilling.
#[derive(Debug)]
pub struct GpuAllocator {
    limit_bytes: usize,
    kind: GpuAllocatorKind,
    stats: Arc<AllocationStats>,
}

impl GpuAllocator {
    pub fn new(memory_fraction: f64, preallocate: bool, kind: GpuAllocatorKind) -> Self {
        let limit_bytes = (SIMULATED_DEVICE_POOL as f64 * memory_fraction) as usize;
        if preallocate {
            tracing::debug!(limit_bytes, %kind, "preallocated device memory pool");
        }
        Self { limit_bytes, kind, stats: Arc::new(AllocationStats::default()) }
    }

    pub fn kind(&self) -> GpuAllocatorKind {
        self.kind
    }
}

impl Allocator for GpuAllocator {
    fn alloc(&self, size: usize) -> Result<DeviceMemory> {
        // Reservation and budget check are one atomic update; two racing
        // allocations can never jointly overshoot the limit.
        snafu::ensure!(
            self.stats.try_reserve(size, self.limit_bytes),
            AllocationSnafu {
                allocator: self.name(),
                size,
                reason: format!(
                    "memory pool limit of {} bytes exceeded ({} in use)",
                    self.limit_bytes,
                    self.stats.allocated_bytes()
                ),
            }
        );
        Ok(DeviceMemory::from_reservation(size, Arc::clone(&self.stats)))
    }

    fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    fn name(&self) -> &str {
        "GPU"
    }
}
