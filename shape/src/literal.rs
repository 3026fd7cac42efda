//! Host-side values: owned literals and borrowed infeed views.

use crate::ElementType;
use crate::error::{ComponentCountMismatchSnafu, NestedTupleSnafu, Result, SizeMismatchSnafu};
use crate::layout::{Layout, relayout_bytes};
use crate::shape::{ArrayShape, Shape};

/// Marker for Rust scalar types that map onto an [`ElementType`].
///
/// Used by typed accessors on [`Literal`]; the runtime itself works on raw
/// bytes throughout.
pub trait NativeType: Copy {
    const ELEMENT_TYPE: ElementType;

    fn from_ne_bytes(bytes: &[u8]) -> Self;
    fn to_ne_bytes(self) -> Vec<u8>;
}

macro_rules! native_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl NativeType for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;

                fn from_ne_bytes(bytes: &[u8]) -> Self {
                    <$ty>::from_ne_bytes(bytes.try_into().expect("element size mismatch"))
                }

                fn to_ne_bytes(self) -> Vec<u8> {
                    <$ty>::to_ne_bytes(self).to_vec()
                }
            }
        )*
    };
}

native_type! {
    i8 => S8, i16 => S16, i32 => S32, i64 => S64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
}

/// An owned host value: an array shape (layout always effective) plus its
/// physical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    shape: ArrayShape,
    bytes: Vec<u8>,
}

impl Literal {
    /// Wrap bytes laid out per `shape.layout_or_default()`.
    pub fn new(shape: ArrayShape, bytes: Vec<u8>) -> Result<Self> {
        snafu::ensure!(
            bytes.len() == shape.byte_size(),
            SizeMismatchSnafu { expected: shape.byte_size(), actual: bytes.len() }
        );
        Ok(Self { shape, bytes })
    }

    /// Build a literal from typed host values, row-major.
    pub fn from_slice<T: NativeType>(values: &[T], dimensions: &[usize]) -> Result<Self> {
        let shape =
            ArrayShape::new(T::ELEMENT_TYPE, dimensions.iter().copied()).with_default_layout();
        let bytes = values.iter().flat_map(|value| value.to_ne_bytes()).collect();
        Self::new(shape, bytes)
    }

    pub fn shape(&self) -> &ArrayShape {
        &self.shape
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Copy this literal into the target physical layout, preserving the
    /// logical value.
    pub fn relayout(&self, target: &Layout) -> Result<Literal> {
        let current = self.shape.layout_or_default();
        if &current == target {
            return Ok(self.clone());
        }

        let bytes = relayout_bytes(
            &self.bytes,
            self.shape.dimensions(),
            self.shape.element_type().size_in_bytes(),
            &current,
            target,
        );
        let shape = self.shape.clone().with_layout(target.clone())?;
        Ok(Literal { shape, bytes })
    }

    /// Typed view of the payload. Only valid for row-major literals of a
    /// matching element type; intended for tests and diagnostics.
    pub fn to_vec<T: NativeType>(&self) -> Vec<T> {
        assert_eq!(self.shape.element_type(), T::ELEMENT_TYPE);
        assert!(self.shape.layout_or_default().is_row_major());
        self.bytes
            .chunks_exact(T::ELEMENT_TYPE.size_in_bytes())
            .map(T::from_ne_bytes)
            .collect()
    }
}

/// A borrowed, zero-copy view over infeed payloads: a target shape plus one
/// byte slice per tuple component (or a single slice for array shapes).
///
/// The slices must stay valid and unmodified for the duration of the
/// transfer; the device-side enqueue is what copies.
#[derive(Debug)]
pub struct BorrowingLiteral<'a> {
    components: Vec<(ArrayShape, &'a [u8])>,
}

impl<'a> BorrowingLiteral<'a> {
    pub fn new(shape: &Shape, payloads: &[&'a [u8]]) -> Result<Self> {
        snafu::ensure!(!shape.is_nested_tuple(), NestedTupleSnafu);

        let component_shapes: Vec<&ArrayShape> = match shape {
            // Array shapes consume exactly the first payload.
            Shape::Array(array) => {
                snafu::ensure!(
                    !payloads.is_empty(),
                    ComponentCountMismatchSnafu { expected: 1usize, actual: 0usize }
                );
                vec![array]
            }
            Shape::Tuple(elements) => {
                snafu::ensure!(
                    elements.len() == payloads.len(),
                    ComponentCountMismatchSnafu { expected: elements.len(), actual: payloads.len() }
                );
                elements.iter().map(|element| element.as_array()).collect::<Result<_>>()?
            }
        };

        let mut components = Vec::with_capacity(component_shapes.len());
        for (component, &payload) in component_shapes.into_iter().zip(payloads) {
            snafu::ensure!(
                payload.len() == component.byte_size(),
                SizeMismatchSnafu { expected: component.byte_size(), actual: payload.len() }
            );
            components.push((component.clone(), payload));
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[(ArrayShape, &'a [u8])] {
        &self.components
    }

    /// Materialize each component as an owned literal, in order.
    pub fn to_literals(&self) -> Vec<Literal> {
        self.components
            .iter()
            .map(|(shape, payload)| Literal { shape: shape.clone(), bytes: payload.to_vec() })
            .collect()
    }
}
