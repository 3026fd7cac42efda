//! Device-resident buffers.

use std::sync::Arc;

use parking_lot::Mutex;
use snafu::ResultExt;
use veld_backend::{Device, DeviceMemory};
use veld_shape::ArrayShape;

use crate::error::{BackendSnafu, FailedPreconditionSnafu, Result};

/// Ownership state of a buffer's backing memory.
///
/// The transitions are one-way: a buffer is created `CallerManaged` or
/// `Transient`, and a transient buffer moves to `Exposed` exactly once, when
/// the run protocol surfaces it to the caller. Freeing is always explicit and
/// always the caller's job once a handle has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Created at the caller's request; the caller frees it.
    CallerManaged,
    /// Synthesized internally from raw bytes during argument unpacking;
    /// must be exposed before dispatch so the caller can track it.
    Transient,
    /// A former transient handed to the caller. From here on it behaves like
    /// a caller-managed buffer.
    Exposed,
}

/// A handle to one device-resident allocation plus its on-device shape.
///
/// Clones share the allocation. The shape's layout is always present and is
/// the device's own convention, which may differ from host-canonical; host
/// materialization normalizes it.
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    inner: Arc<BufferInner>,
}

#[derive(Debug)]
struct BufferInner {
    memory: DeviceMemory,
    shape: ArrayShape,
    device: Arc<Device>,
    disposition: Mutex<Disposition>,
}

impl DeviceBuffer {
    pub(crate) fn new(
        memory: DeviceMemory,
        shape: ArrayShape,
        device: Arc<Device>,
        disposition: Disposition,
    ) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                memory,
                shape,
                device,
                disposition: Mutex::new(disposition),
            }),
        }
    }

    /// On-device shape, layout always present.
    pub fn shape(&self) -> &ArrayShape {
        &self.inner.shape
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.inner.device
    }

    pub(crate) fn memory(&self) -> &DeviceMemory {
        &self.inner.memory
    }

    pub fn disposition(&self) -> Disposition {
        *self.inner.disposition.lock()
    }

    /// Whether this buffer was synthesized during argument unpacking and is
    /// still waiting to be surfaced to the caller.
    pub fn release_after_run(&self) -> bool {
        self.disposition() == Disposition::Transient
    }

    pub fn is_deallocated(&self) -> bool {
        self.inner.memory.is_released()
    }

    /// Suspend the calling thread until in-flight device work touching this
    /// buffer has completed.
    pub fn block_until_ready(&self) {
        self.inner.memory.ready().wait();
    }

    /// Transition `Transient` → `Exposed`. Part of the pre-dispatch
    /// liveness step; fails on a buffer that is not transient.
    pub fn expose(&self) -> Result<()> {
        let mut disposition = self.inner.disposition.lock();
        snafu::ensure!(
            *disposition == Disposition::Transient,
            FailedPreconditionSnafu {
                message: format!("cannot expose a {disposition:?} buffer"),
            }
        );
        *disposition = Disposition::Exposed;
        Ok(())
    }

    /// Materialize the buffer to freshly owned host bytes.
    ///
    /// Blocks until pending device work completes, then compares the
    /// on-device layout against the host-canonical one and relayouts first
    /// when they differ. A non-negative `max_size` smaller than the payload
    /// truncates the copy; any other value yields the full payload.
    pub fn to_host_bytes(&self, max_size: i64) -> Result<Vec<u8>> {
        snafu::ensure!(
            !self.is_deallocated(),
            FailedPreconditionSnafu {
                message: "cannot materialize a deallocated buffer".to_string(),
            }
        );
        self.block_until_ready();

        let literal = self
            .inner
            .device
            .transfer_from_device(&self.inner.memory, &self.inner.shape)
            .context(BackendSnafu)?;

        let host_shape = self.inner.shape.host_shape();
        let host_layout = host_shape.layout_or_default();
        let literal = if self.inner.shape.layout_or_default() == host_layout {
            literal
        } else {
            literal
                .relayout(&host_layout)
                .map_err(|source| veld_backend::Error::Shape { source })
                .context(BackendSnafu)?
        };

        let mut bytes = literal.into_bytes();
        if max_size >= 0 && (max_size as usize) < bytes.len() {
            bytes.truncate(max_size as usize);
        }
        Ok(bytes)
    }

    /// Free the backing device memory.
    ///
    /// A second deallocate is an error, never a silent no-op; afterwards the
    /// buffer cannot be materialized or passed as an execution argument.
    pub fn deallocate(&self) -> Result<()> {
        self.inner.memory.release().map_err(|_| {
            FailedPreconditionSnafu {
                message: "buffer already deallocated".to_string(),
            }
            .build()
        })
    }
}
