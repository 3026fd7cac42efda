//! The device client: entry point bound to one backend.

use std::sync::Arc;

use snafu::ResultExt;
use veld_backend::{
    Backend, BuildOptions, CompileOptions, Computation, CpuBackend, Device, DeviceId,
    GpuBackend, GpuOptions, Platform, TpuBackend,
};
use veld_shape::{ArrayShape, BorrowingLiteral, Shape};

use crate::buffer::{DeviceBuffer, Disposition};
use crate::error::{BackendSnafu, InvalidArgumentSnafu, Result};
use crate::executable::Executable;

/// A client bound to one CPU, GPU or TPU backend.
///
/// The client is the sole factory for the buffers and executables it hands
/// out, but owns none of them; each is independently owned by the caller.
/// Cloning is cheap and clones share the backend.
#[derive(Debug, Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
}

impl Client {
    /// Client over the host-CPU backend.
    pub fn cpu() -> Result<Self> {
        let backend = CpuBackend::new().context(BackendSnafu)?;
        Ok(Self { backend: Arc::new(backend) })
    }

    /// Client over a GPU backend. Fails with the backend's initialization
    /// error when the options are rejected; a partially initialized client
    /// is never returned.
    pub fn gpu(options: GpuOptions) -> Result<Self> {
        let backend = GpuBackend::new(options).context(BackendSnafu)?;
        Ok(Self { backend: Arc::new(backend) })
    }

    /// Client over a TPU backend.
    pub fn tpu() -> Result<Self> {
        let backend = TpuBackend::new().context(BackendSnafu)?;
        Ok(Self { backend: Arc::new(backend) })
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    pub fn device_count(&self) -> usize {
        self.backend.device_count()
    }

    /// Resolve a device id to exactly one known device.
    ///
    /// An explicit id must resolve or the call fails; `None` selects the
    /// default assignment, device 0.
    pub fn resolve_device(&self, id: Option<DeviceId>) -> Result<Arc<Device>> {
        let id = id.unwrap_or(0);
        self.backend.device(id).ok_or_else(|| {
            InvalidArgumentSnafu {
                message: format!(
                    "no device {id} on this {} client ({} devices)",
                    self.platform(),
                    self.device_count()
                ),
            }
            .build()
        })
    }

    /// Transfer host bytes into a fresh device buffer.
    ///
    /// The source bytes are borrowed immutably until the transfer completes.
    /// `release_after_run` tags the buffer transient, for use by the run
    /// protocol's argument unpacking; callers creating durable buffers pass
    /// `false`.
    pub fn buffer_from_host_bytes(
        &self,
        bytes: &[u8],
        shape: &Shape,
        device_id: DeviceId,
        release_after_run: bool,
    ) -> Result<DeviceBuffer> {
        let device = self.resolve_device(Some(device_id))?;
        let array = array_shape(shape)?;
        let disposition =
            if release_after_run { Disposition::Transient } else { Disposition::CallerManaged };
        transfer_to_buffer(bytes, &array, &device, disposition)
    }

    /// Compile a computation into a reusable [`Executable`].
    ///
    /// Layout annotations on the supplied argument shapes are stripped before
    /// compilation: layout is a backend concern decided at compile time, not
    /// dictated by the caller. Backend compile failures pass through
    /// unchanged. After compilation the backend is asked for a fingerprint;
    /// absence of one is not an error.
    pub fn compile(
        &self,
        computation: &Computation,
        argument_shapes: &[ArrayShape],
        build: BuildOptions,
        portable: bool,
    ) -> Result<Executable> {
        let argument_layouts = argument_shapes
            .iter()
            .map(|shape| shape.clone().without_layout())
            .collect();
        let options = CompileOptions { argument_layouts, portable, build };

        let program = self.backend.compile(computation, &options).context(BackendSnafu)?;
        let fingerprint = self.backend.fingerprint(program.as_ref());

        tracing::debug!(
            program = program.name(),
            platform = %self.platform(),
            fingerprint = fingerprint.as_deref(),
            "compiled executable"
        );

        Ok(Executable::new(program, fingerprint, self.clone()))
    }

    /// Stream payloads into a device's infeed queue.
    ///
    /// A one-level tuple shape consumes one payload per component, in order;
    /// deeper nesting is rejected before anything is transferred. A
    /// non-tuple shape consumes exactly one payload, and an empty payload
    /// list is an error. The payload slices are borrowed views; the
    /// device-side enqueue is the copy point.
    pub fn transfer_to_infeed(
        &self,
        payloads: &[&[u8]],
        shape: &Shape,
        device_id: DeviceId,
    ) -> Result<()> {
        let device = self.resolve_device(Some(device_id))?;
        let literal = BorrowingLiteral::new(shape, payloads).map_err(|source| {
            InvalidArgumentSnafu { message: format!("malformed infeed transfer: {source}") }
                .build()
        })?;
        device.transfer_to_infeed(&literal).context(BackendSnafu)
    }

    /// Block until the device produces an outfeed value of the expected
    /// shape, then return it as freshly owned host bytes. Backend transfer
    /// failures propagate verbatim.
    pub fn transfer_from_outfeed(
        &self,
        device_id: DeviceId,
        shape: &Shape,
    ) -> Result<Vec<u8>> {
        let device = self.resolve_device(Some(device_id))?;
        let expected = array_shape(shape)?;
        let literal = device.transfer_from_outfeed(&expected).context(BackendSnafu)?;
        Ok(literal.into_bytes())
    }
}

/// Buffers are array-shaped; tuple-shaped device values only exist flattened.
fn array_shape(shape: &Shape) -> Result<ArrayShape> {
    shape.as_array().cloned().map_err(|_| {
        InvalidArgumentSnafu {
            message: format!(
                "expected an array shape, got a tuple of {} elements",
                shape.tuple_element_count()
            ),
        }
        .build()
    })
}

/// Shared transfer path for caller-created buffers and run-protocol
/// transients.
pub(crate) fn transfer_to_buffer(
    bytes: &[u8],
    shape: &ArrayShape,
    device: &Arc<Device>,
    disposition: Disposition,
) -> Result<DeviceBuffer> {
    snafu::ensure!(
        bytes.len() == shape.byte_size(),
        InvalidArgumentSnafu {
            message: format!(
                "payload of {} bytes does not match shape of {} bytes",
                bytes.len(),
                shape.byte_size()
            ),
        }
    );
    let (memory, on_device_shape) =
        device.transfer_to_device(bytes, shape).context(BackendSnafu)?;
    Ok(DeviceBuffer::new(memory, on_device_shape, Arc::clone(device), disposition))
}
