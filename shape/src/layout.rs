//! Physical layouts and the strided index math behind relayout copies.

use smallvec::SmallVec;

use crate::error::{InvalidLayoutSnafu, Result};

/// Physical dimension order of an array, minor (fastest varying) first.
///
/// A layout for a rank-`n` array is a permutation of `0..n`. The
/// host-canonical layout is [`Layout::row_major`]; device backends are free
/// to pick anything else, which is what forces a relayout copy before host
/// materialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    minor_to_major: SmallVec<[usize; 4]>,
}

impl Layout {
    /// Build a layout from an explicit minor-to-major dimension order.
    pub fn new(minor_to_major: impl IntoIterator<Item = usize>, rank: usize) -> Result<Self> {
        let minor_to_major: SmallVec<[usize; 4]> = minor_to_major.into_iter().collect();

        let mut seen = vec![false; rank];
        let valid = minor_to_major.len() == rank
            && minor_to_major.iter().all(|&dim| {
                if dim >= rank || seen[dim] {
                    return false;
                }
                seen[dim] = true;
                true
            });
        snafu::ensure!(valid, InvalidLayoutSnafu { minor_to_major: minor_to_major.to_vec(), rank });

        Ok(Self { minor_to_major })
    }

    /// Host-canonical layout: the last dimension varies fastest.
    pub fn row_major(rank: usize) -> Self {
        Self { minor_to_major: (0..rank).rev().collect() }
    }

    /// The first dimension varies fastest.
    pub fn column_major(rank: usize) -> Self {
        Self { minor_to_major: (0..rank).collect() }
    }

    pub fn rank(&self) -> usize {
        self.minor_to_major.len()
    }

    pub fn minor_to_major(&self) -> &[usize] {
        &self.minor_to_major
    }

    pub fn is_row_major(&self) -> bool {
        self.minor_to_major.iter().rev().copied().eq(0..self.rank())
    }

    /// Element strides per logical dimension, in elements (not bytes).
    pub fn strides(&self, dimensions: &[usize]) -> SmallVec<[usize; 4]> {
        debug_assert_eq!(dimensions.len(), self.rank());
        let mut strides: SmallVec<[usize; 4]> = smallvec::smallvec![0; self.rank()];
        let mut stride = 1;
        for &dim in &self.minor_to_major {
            strides[dim] = stride;
            stride *= dimensions[dim];
        }
        strides
    }
}

/// Reorder `source` (laid out per `from`) into a fresh buffer laid out per
/// `to`, preserving logical element positions.
///
/// Rank-0 and single-element arrays are copied verbatim.
pub fn relayout_bytes(
    source: &[u8],
    dimensions: &[usize],
    element_size: usize,
    from: &Layout,
    to: &Layout,
) -> Vec<u8> {
    if from == to || dimensions.iter().product::<usize>() <= 1 {
        return source.to_vec();
    }

    let from_strides = from.strides(dimensions);
    let to_strides = to.strides(dimensions);

    let element_count = dimensions.iter().product::<usize>();
    let mut target = vec![0u8; source.len()];
    let mut index: SmallVec<[usize; 4]> = smallvec::smallvec![0; dimensions.len()];

    for _ in 0..element_count {
        let src_element: usize = index.iter().zip(&from_strides).map(|(i, s)| i * s).sum();
        let dst_element: usize = index.iter().zip(&to_strides).map(|(i, s)| i * s).sum();

        let src = src_element * element_size;
        let dst = dst_element * element_size;
        target[dst..dst + element_size].copy_from_slice(&source[src..src + element_size]);

        // Advance the logical index, last dimension fastest.
        for dim in (0..dimensions.len()).rev() {
            index[dim] += 1;
            if index[dim] < dimensions[dim] {
                break;
            }
            index[dim] = 0;
        }
    }

    target
}
