//! Compiled executables and the run protocol.

use std::sync::Arc;

use snafu::ResultExt;
use veld_backend::{DeviceId, DeviceMemory, Program};
use veld_shape::{ArrayShape, Shape};

use crate::buffer::{DeviceBuffer, Disposition};
use crate::client::{Client, transfer_to_buffer};
use crate::error::{BackendSnafu, FailedPreconditionSnafu, InvalidArgumentSnafu, Result};

/// One element of a run's argument list.
///
/// Exactly two cases: raw host bytes to be staged onto the device, or an
/// existing buffer handle reused as-is. Ownership of a `Buffer` argument
/// stays with the caller.
#[derive(Debug)]
pub enum RunArgument {
    HostBytes { bytes: Vec<u8>, shape: Shape },
    Buffer(DeviceBuffer),
}

/// Per-run options.
#[derive(Debug, Clone, bon::Builder)]
pub struct RunOptions {
    /// Return result buffers as device-resident handles instead of
    /// materializing them to host bytes.
    #[builder(default = false)]
    pub keep_on_device: bool,

    /// Explicit target device (portable mode). `None` runs the single
    /// replicated group against the default device assignment.
    pub device_id: Option<DeviceId>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One run result: a device-resident handle or host bytes, per
/// `keep_on_device`.
#[derive(Debug)]
pub enum RunValue {
    Buffer(DeviceBuffer),
    Bytes(Vec<u8>),
}

/// Everything a run hands back.
#[derive(Debug)]
pub struct RunOutcome {
    /// Untupled results, in declaration order.
    pub outputs: Vec<RunValue>,

    /// Transient buffers synthesized from `HostBytes` arguments, exposed so
    /// the caller can track and eventually free them. Never silently
    /// dropped.
    pub transferred_arguments: Vec<DeviceBuffer>,

    /// Replica indicator; always 0 on the single-group path. Kept for
    /// forward compatibility with multi-device replica reporting.
    pub replica: u32,
}

/// A compiled computation bound to the client that produced it.
///
/// Immutable once constructed; may be run repeatedly and concurrently with
/// different argument sets.
#[derive(Debug, Clone)]
pub struct Executable {
    program: Arc<dyn Program>,
    fingerprint: Option<String>,
    client: Client,
}

impl Executable {
    pub(crate) fn new(
        program: Arc<dyn Program>,
        fingerprint: Option<String>,
        client: Client,
    ) -> Self {
        Self { program, fingerprint, client }
    }

    pub fn name(&self) -> &str {
        self.program.name()
    }

    /// Backend-assigned identity string, when the backend supports
    /// fingerprinting.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run the executable.
    ///
    /// Arguments are unpacked into a uniform vector of device buffers:
    /// `HostBytes` elements become transient buffers on the target device
    /// (device 0 when no explicit id is given), existing handles are reused
    /// unmodified. The first malformed element aborts the unpack; buffers
    /// already created for earlier elements are not rolled back and stay the
    /// caller's responsibility.
    ///
    /// Before dispatch, every transient buffer is confirmed transferred and
    /// exposed into the outcome's `transferred_arguments`. Dispatch runs a
    /// single input group — against the named device in portable mode, or
    /// the default assignment otherwise — with untupled results and relaxed
    /// argument shape checking. Result buffers either come back as durable
    /// handles (`keep_on_device`) or are materialized fully to host bytes
    /// and freed.
    pub fn run(&self, arguments: Vec<RunArgument>, options: &RunOptions) -> Result<RunOutcome> {
        let device = self.client.resolve_device(options.device_id)?;

        // Argument unpack: heterogeneous list in, device buffers out.
        let mut buffers = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                RunArgument::HostBytes { bytes, shape } => {
                    let array = shape.as_array().map_err(|_| {
                        InvalidArgumentSnafu {
                            message: "run arguments must be array-shaped, got a tuple"
                                .to_string(),
                        }
                        .build()
                    })?;
                    let buffer =
                        transfer_to_buffer(&bytes, array, &device, Disposition::Transient)?;
                    buffers.push(buffer);
                }
                RunArgument::Buffer(buffer) => {
                    snafu::ensure!(
                        !buffer.is_deallocated(),
                        FailedPreconditionSnafu {
                            message: "deallocated buffer passed as run argument".to_string(),
                        }
                    );
                    buffers.push(buffer);
                }
            }
        }

        // Pre-dispatch liveness: transients must be transferred and exposed
        // before control can return, so none is ever silently dropped.
        let mut transferred_arguments = Vec::new();
        for buffer in &buffers {
            if buffer.release_after_run() {
                buffer.block_until_ready();
                buffer.expose()?;
                transferred_arguments.push(buffer.clone());
            }
        }

        let program_arguments: Vec<(DeviceMemory, ArrayShape)> = buffers
            .iter()
            .map(|buffer| (buffer.memory().clone(), buffer.shape().clone()))
            .collect();

        let results =
            self.program.execute(&device, &program_arguments).context(BackendSnafu)?;

        // Result unpack: durable handles or fully materialized host bytes.
        let result_buffers: Vec<DeviceBuffer> = results
            .into_iter()
            .map(|(memory, shape)| {
                DeviceBuffer::new(memory, shape, Arc::clone(&device), Disposition::CallerManaged)
            })
            .collect();

        let mut outputs = Vec::with_capacity(result_buffers.len());
        if options.keep_on_device {
            outputs.extend(result_buffers.into_iter().map(RunValue::Buffer));
        } else {
            for (index, buffer) in result_buffers.iter().enumerate() {
                let materialized = buffer.to_host_bytes(-1).and_then(|bytes| {
                    buffer.deallocate()?;
                    Ok(bytes)
                });
                match materialized {
                    Ok(bytes) => outputs.push(RunValue::Bytes(bytes)),
                    Err(error) => {
                        // These buffers were never handed to the caller, so
                        // nothing else can free them once the error
                        // propagates.
                        for orphan in &result_buffers[index..] {
                            if !orphan.is_deallocated() {
                                let _ = orphan.deallocate();
                            }
                        }
                        return Err(error);
                    }
                }
            }
        }

        tracing::debug!(
            program = self.program.name(),
            device = device.id(),
            outputs = outputs.len(),
            transferred = transferred_arguments.len(),
            keep_on_device = options.keep_on_device,
            "run complete"
        );

        Ok(RunOutcome { outputs, transferred_arguments, replica: 0 })
    }
}
