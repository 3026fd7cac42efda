use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Layout is not a permutation of the shape's dimension indices.
    #[snafu(display("invalid layout {minor_to_major:?} for rank {rank}"))]
    InvalidLayout { minor_to_major: Vec<usize>, rank: usize },

    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// An array-shaped value was required but a tuple shape was supplied.
    #[snafu(display("expected an array shape, got a tuple of {elements} elements"))]
    NotAnArray { elements: usize },

    #[snafu(display("nested tuple shapes are not supported here"))]
    NestedTuple,

    #[snafu(display("tuple shape has {expected} components, got {actual} payloads"))]
    ComponentCountMismatch { expected: usize, actual: usize },
}
