//! Shape and layout descriptors for the veld runtime.
//!
//! A [`Shape`] describes an element type, a dimension list and (optionally)
//! the physical layout of a value. [`Literal`] is an owned host-side value
//! carrying its shape; it is the unit of host↔device transfer.

pub mod error;
pub mod layout;
pub mod literal;
pub mod shape;


pub use error::{Error, Result};
pub use layout::Layout;
pub use literal::{BorrowingLiteral, Literal, NativeType};
pub use shape::{ArrayShape, Shape};

/// Scalar element types supported by the runtime.
///
/// This is a closed set: backends may reject some of these at compile time,
/// but no backend introduces types outside of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::Display)]
pub enum ElementType {
    /// Boolean predicate, stored as one byte.
    Pred,

    S8,
    S16,
    S32,
    S64,

    U8,
    U16,
    U32,
    U64,

    F32,
    F64,
}

impl ElementType {
    /// Storage size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            ElementType::Pred | ElementType::S8 | ElementType::U8 => 1,
            ElementType::S16 | ElementType::U16 => 2,
            ElementType::S32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::S64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Whether arithmetic is defined for this type.
    pub const fn is_numeric(self) -> bool {
        !matches!(self, ElementType::Pred)
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}
