//! Client-facing error taxonomy.
//!
//! Three kinds, deliberately: malformed caller input, valid requests against
//! objects in the wrong state, and backend failures passed through verbatim.
//! The client never interprets or retries a backend error.

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Malformed caller input: unresolvable device id, tuple shape where an
    /// array is required, payload/shape size disagreement, nested-tuple
    /// infeed shape, wrong infeed payload count.
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },

    /// A valid-looking request against an object in the wrong state, such as
    /// deallocating an already-deallocated buffer.
    #[snafu(display("failed precondition: {message}"))]
    FailedPrecondition { message: String },

    /// Compilation, execution or transfer failure surfaced unchanged from
    /// the compute backend.
    #[snafu(display("backend failure: {source}"))]
    Backend { source: veld_backend::Error },
}
