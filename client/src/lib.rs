//! The veld device-client runtime.
//!
//! This crate is the boundary between host code and the device backends:
//! it represents device-resident memory as reference-counted
//! [`DeviceBuffer`] handles that can be materialized back to host bytes,
//! compiles computations into reusable [`Executable`]s and dispatches them
//! per the run protocol, and streams data through the infeed/outfeed side
//! channel independently of ordinary arguments.
//!
//! Entry point is [`Client`]: one of [`Client::cpu`], [`Client::gpu`] or
//! [`Client::tpu`], each either fully usable or failed with the backend's
//! initialization error.
//!
//! ```no_run
//! use veld_client::{Client, RunArgument, RunOptions};
//! use veld_shape::{ElementType, Shape};
//!
//! # fn main() -> veld_client::Result<()> {
//! let client = Client::cpu()?;
//! let shape = Shape::array(ElementType::F32, [2, 2]);
//! let buffer = client.buffer_from_host_bytes(&[0u8; 16], &shape, 0, false)?;
//! let bytes = buffer.to_host_bytes(-1)?;
//! buffer.deallocate()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod client;
pub mod error;
pub mod executable;


pub use buffer::{DeviceBuffer, Disposition};
pub use client::Client;
pub use error::{Error, Result};
pub use executable::{Executable, RunArgument, RunOptions, RunOutcome, RunValue};

pub use veld_backend::{BuildOptions, Computation, DeviceId, GpuAllocatorKind, GpuOptions, Op, Platform};
