//! Array and tuple shapes.

use smallvec::SmallVec;

use crate::ElementType;
use crate::error::{NotAnArraySnafu, Result};
use crate::layout::Layout;

/// Shape of a single array: element type, dimensions and an optional
/// physical layout.
///
/// A missing layout means "decided later": callers hand layout-free shapes
/// to the compiler, and devices stamp their own convention on buffers they
/// create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayShape {
    element_type: ElementType,
    dimensions: SmallVec<[usize; 4]>,
    layout: Option<Layout>,
}

impl ArrayShape {
    pub fn new(element_type: ElementType, dimensions: impl IntoIterator<Item = usize>) -> Self {
        Self { element_type, dimensions: dimensions.into_iter().collect(), layout: None }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    pub fn element_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn byte_size(&self) -> usize {
        self.element_count() * self.element_type.size_in_bytes()
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// The layout bytes of this shape are actually stored in, defaulting to
    /// host-canonical row-major when none was set.
    pub fn layout_or_default(&self) -> Layout {
        self.layout.clone().unwrap_or_else(|| Layout::row_major(self.rank()))
    }

    pub fn with_layout(mut self, layout: Layout) -> Result<Self> {
        snafu::ensure!(
            layout.rank() == self.rank(),
            crate::error::InvalidLayoutSnafu {
                minor_to_major: layout.minor_to_major().to_vec(),
                rank: self.rank(),
            }
        );
        self.layout = Some(layout);
        Ok(self)
    }

    pub fn with_default_layout(mut self) -> Self {
        self.layout = Some(Layout::row_major(self.rank()));
        self
    }

    /// Strip any layout annotation. Layout is a backend concern decided at
    /// compile time, not dictated by the caller.
    pub fn without_layout(mut self) -> Self {
        self.layout = None;
        self
    }

    /// Host-canonical counterpart: same element type and dimensions,
    /// row-major layout.
    pub fn host_shape(&self) -> ArrayShape {
        Self::new(self.element_type, self.dimensions.iter().copied()).with_default_layout()
    }
}

/// An array shape or a tuple of shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Array(ArrayShape),
    Tuple(Vec<Shape>),
}

impl Shape {
    pub fn array(element_type: ElementType, dimensions: impl IntoIterator<Item = usize>) -> Self {
        Shape::Array(ArrayShape::new(element_type, dimensions))
    }

    pub fn tuple(elements: impl IntoIterator<Item = Shape>) -> Self {
        Shape::Tuple(elements.into_iter().collect())
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Shape::Tuple(_))
    }

    /// True if any tuple component is itself a tuple.
    pub fn is_nested_tuple(&self) -> bool {
        match self {
            Shape::Array(_) => false,
            Shape::Tuple(elements) => elements.iter().any(Shape::is_tuple),
        }
    }

    pub fn tuple_element_count(&self) -> usize {
        match self {
            Shape::Array(_) => 0,
            Shape::Tuple(elements) => elements.len(),
        }
    }

    /// Total payload size in bytes; for tuples, the sum over leaves.
    pub fn byte_size(&self) -> usize {
        match self {
            Shape::Array(array) => array.byte_size(),
            Shape::Tuple(elements) => elements.iter().map(Shape::byte_size).sum(),
        }
    }

    pub fn as_array(&self) -> Result<&ArrayShape> {
        match self {
            Shape::Array(array) => Ok(array),
            Shape::Tuple(elements) => NotAnArraySnafu { elements: elements.len() }.fail(),
        }
    }

    /// Whether two shapes describe byte-identical physical values: same
    /// element types, dimensions, and effective layouts throughout.
    pub fn layouts_equal(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Array(a), Shape::Array(b)) => {
                a.element_type == b.element_type
                    && a.dimensions == b.dimensions
                    && a.layout_or_default() == b.layout_or_default()
            }
            (Shape::Tuple(a), Shape::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.layouts_equal(y))
            }
            _ => false,
        }
    }
}

impl From<ArrayShape> for Shape {
    fn from(array: ArrayShape) -> Self {
        Shape::Array(array)
    }
}
