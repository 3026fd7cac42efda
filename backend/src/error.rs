//! Error types for backend operations.

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Device memory allocation failed.
    #[snafu(display("allocation of {size} bytes failed on {allocator}: {reason}"))]
    Allocation { allocator: String, size: usize, reason: String },

    /// Memory handle was already released.
    #[snafu(display("device memory already released"))]
    MemoryReleased,

    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// The backend compiler rejected a computation.
    #[snafu(display("compilation failed: {reason}"))]
    Compilation { reason: String },

    /// A compiled program failed at execution time.
    #[snafu(display("execution failed: {reason}"))]
    Execution { reason: String },

    /// Infeed/outfeed transfer failure.
    #[snafu(display("transfer failed: {reason}"))]
    Transfer { reason: String },

    /// Backend construction options were rejected.
    #[snafu(display("invalid backend options: {reason}"))]
    InvalidOptions { reason: String },

    /// Shape-level failure surfaced through a transfer.
    #[snafu(display("shape error: {source}"))]
    Shape { source: veld_shape::Error },
}
