//! The regular chunk grid.
//!
//! A dataset is partitioned into chunks of a fixed shape anchored at the origin.
//! Chunks on the upper edge of a dataset may extend beyond its shape.

use crate::{array_subset::ArraySubset, dataspace::MaxExtent, ArrayIndices, ArrayShape};

/// A regular chunk grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularChunkGrid {
    chunk_shape: ArrayShape,
}

impl RegularChunkGrid {
    /// Create a new regular chunk grid with chunk shape `chunk_shape`.
    #[must_use]
    pub fn new(chunk_shape: ArrayShape) -> Self {
        Self { chunk_shape }
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Return the dimensionality of the grid.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.chunk_shape.len()
    }

    /// Return the number of chunks along each dimension of an array with `array_shape`.
    #[must_use]
    pub fn grid_shape(&self, array_shape: &[u64]) -> ArrayShape {
        debug_assert_eq!(array_shape.len(), self.dimensionality());
        std::iter::zip(array_shape, &self.chunk_shape)
            .map(|(a, s)| if *s == 0 { 0 } else { a.div_ceil(*s) })
            .collect()
    }

    /// Return the origin of the chunk at `chunk_indices`.
    #[must_use]
    pub fn chunk_origin(&self, chunk_indices: &[u64]) -> ArrayIndices {
        debug_assert_eq!(self.dimensionality(), chunk_indices.len());
        std::iter::zip(chunk_indices, &self.chunk_shape)
            .map(|(i, s)| i * s)
            .collect()
    }

    /// Return the indices of the chunk holding the element at `array_indices`.
    #[must_use]
    pub fn chunk_indices(&self, array_indices: &[u64]) -> ArrayIndices {
        debug_assert_eq!(self.dimensionality(), array_indices.len());
        std::iter::zip(array_indices, &self.chunk_shape)
            .map(|(i, s)| i / s)
            .collect()
    }

    /// Return the indices of the element at `array_indices` within its chunk.
    #[must_use]
    pub fn chunk_element_indices(&self, array_indices: &[u64]) -> ArrayIndices {
        debug_assert_eq!(self.dimensionality(), array_indices.len());
        std::iter::zip(array_indices, &self.chunk_shape)
            .map(|(i, s)| i % s)
            .collect()
    }

    /// Return the region of the chunk at `chunk_indices`, unbounded by any array shape.
    #[must_use]
    pub fn chunk_subset(&self, chunk_indices: &[u64]) -> ArraySubset {
        ArraySubset::new_with_start_shape(
            self.chunk_origin(chunk_indices),
            self.chunk_shape.clone(),
        )
        .unwrap_or_default()
    }

    /// Return the subset of chunk indices of the chunks intersecting `array_subset`.
    #[must_use]
    pub fn chunks_in_array_subset(&self, array_subset: &ArraySubset) -> ArraySubset {
        if array_subset.is_empty() {
            return ArraySubset::new_with_shape(vec![0; self.dimensionality()]);
        }
        let start = self.chunk_indices(array_subset.start());
        let end: Vec<u64> = std::iter::zip(array_subset.end_exc(), &self.chunk_shape)
            .map(|(end, s)| end.div_ceil(*s))
            .collect();
        ArraySubset::new_with_start_end_exc(start, &end).unwrap_or_default()
    }
}

/// Choose a chunk shape for a dataset with `shape`, `maxshape`, and elements of `element_size` bytes.
///
/// The chunk byte-size is brought within `[min_bytes, max_bytes]`:
///  - the largest chunk extent is halved while the chunk exceeds `max_bytes`, then
///  - extents are doubled while the chunk is below `min_bytes`, unbounded dimensions first, with bounded dimensions capped at their maximum extent.
///
/// If a single element exceeds `max_bytes` the chunk is a single element.
/// If the whole maximum shape is smaller than `min_bytes` the chunk covers it.
#[must_use]
pub fn auto_chunk_shape(
    shape: &[u64],
    maxshape: &[MaxExtent],
    element_size: usize,
    min_bytes: u64,
    max_bytes: u64,
) -> ArrayShape {
    let element_size = element_size.max(1) as u128;
    let (min_bytes, max_bytes) = (u128::from(min_bytes), u128::from(max_bytes));
    if element_size > max_bytes {
        return vec![1; shape.len()];
    }
    let chunk_bytes =
        |chunk: &[u64]| chunk.iter().map(|&c| u128::from(c)).product::<u128>() * element_size;

    let mut chunk: ArrayShape = shape.iter().map(|&extent| extent.max(1)).collect();
    while chunk_bytes(&chunk) > max_bytes {
        let Some((axis, _)) = chunk.iter().enumerate().max_by_key(|(axis, c)| (**c, usize::MAX - axis)) else {
            break;
        };
        chunk[axis] = chunk[axis].div_ceil(2);
    }

    let cap = |axis: usize| match maxshape.get(axis) {
        Some(MaxExtent::Bounded(max)) => (*max).max(1),
        Some(MaxExtent::Unbounded) | None => u64::MAX,
    };
    let mut exhausted: Vec<bool> = (0..chunk.len()).map(|axis| chunk[axis] >= cap(axis)).collect();
    while chunk_bytes(&chunk) < min_bytes {
        let candidate = |unbounded: bool| {
            (0..chunk.len())
                .filter(|&axis| {
                    !exhausted[axis] && (maxshape.get(axis) == Some(&MaxExtent::Unbounded)) == unbounded
                })
                .min_by_key(|&axis| chunk[axis])
        };
        let Some(axis) = candidate(true).or_else(|| candidate(false)) else {
            break;
        };
        let grown = chunk[axis].saturating_mul(2).min(cap(axis));
        let bytes = chunk_bytes(&chunk) / u128::from(chunk[axis]) * u128::from(grown);
        if bytes > max_bytes {
            exhausted[axis] = true;
        } else {
            chunk[axis] = grown;
            exhausted[axis] = grown >= cap(axis);
        }
    }
    chunk
}
