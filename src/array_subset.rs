//! Array subsets.
//!
//! An [`ArraySubset`] is a rectangular region of an array with a start and a shape.
//! It is used for chunk regions, chunk iteration, and the hyperslabs of resize.

use std::ops::Range;

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

use crate::{num_elements, unravel_index, ArrayIndices, ArrayShape, ErrorKind};

/// An array subset.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    /// The start of the array subset.
    start: ArrayIndices,
    /// The shape of the array subset.
    shape: ArrayShape,
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }

    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Value`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: ArrayShape) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: ArrayIndices,
        shape: ArrayShape,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(start.len(), shape.len()))
        }
    }

    /// Create a new array subset from a list of [`Range`]s.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Create a new array subset from a start and end (exclusive).
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the lengths of `start` and `end` do not match.
    pub fn new_with_start_end_exc(
        start: ArrayIndices,
        end: &[u64],
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != end.len() {
            return Err(IncompatibleDimensionalityError::new(end.len(), start.len()));
        }
        let shape = std::iter::zip(&start, end)
            .map(|(start, end)| end.saturating_sub(*start))
            .collect();
        Ok(Self { start, shape })
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> ArrayIndices {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        num_elements(&self.shape)
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&size| size == 0)
    }

    /// Returns true if `indices` are within the array subset.
    #[must_use]
    pub fn contains(&self, indices: &[u64]) -> bool {
        indices.len() == self.dimensionality()
            && izip!(indices, &self.start, &self.shape)
                .all(|(&i, &start, &size)| i >= start && i < start + size)
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(&self.start, &self.shape, array_shape)
                .all(|(start, size, shape)| start + size <= *shape)
    }

    /// Return the overlapping subset of this array subset and `subset_other`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `subset_other` does not match.
    pub fn overlap(&self, subset_other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if subset_other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                subset_other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let mut start = Vec::with_capacity(self.dimensionality());
        let mut shape = Vec::with_capacity(self.dimensionality());
        for (start_a, size_a, start_b, size_b) in izip!(
            &self.start,
            &self.shape,
            subset_other.start(),
            subset_other.shape()
        ) {
            let overlap_start = *std::cmp::max(start_a, start_b);
            let overlap_end = std::cmp::min(start_a + size_a, start_b + size_b);
            start.push(overlap_start);
            shape.push(overlap_end.saturating_sub(overlap_start));
        }
        Ok(Self { start, shape })
    }

    /// Return the array subset with its start made relative to `start`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` does not match.
    pub fn relative_to(&self, start: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                start.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: std::iter::zip(&self.start, start)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Bound the array subset to the domain within `end` (exclusive).
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `end` does not match.
    pub fn bound(&self, end: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        self.overlap(&Self::new_with_shape(end.to_vec()))
    }

    /// Returns an iterator over the indices of elements within the subset in row-major order.
    #[must_use]
    pub fn iter_indices(&self) -> IndicesIterator {
        IndicesIterator::new(self.clone())
    }
}

/// An iterator over the indices in an array subset in row-major order.
///
/// A zero-dimensional subset yields a single empty index.
#[derive(Clone, Debug)]
pub struct IndicesIterator {
    subset: ArraySubset,
    index: u64,
    length: u64,
}

impl IndicesIterator {
    fn new(subset: ArraySubset) -> Self {
        let length = subset.num_elements();
        Self {
            subset,
            index: 0,
            length,
        }
    }
}

impl Iterator for IndicesIterator {
    type Item = ArrayIndices;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.length {
            return None;
        }
        let mut indices = unravel_index(self.index, self.subset.shape());
        for (index, start) in std::iter::zip(&mut indices, self.subset.start()) {
            *index += start;
        }
        self.index += 1;
        Some(indices)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.length - self.index).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndicesIterator {}

impl std::iter::FusedIterator for IndicesIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset_basics() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 2..6]);
        assert_eq!(subset.start(), &[1, 2]);
        assert_eq!(subset.shape(), &[2, 4]);
        assert_eq!(subset.end_exc(), vec![3, 6]);
        assert_eq!(subset.num_elements(), 8);
        assert!(subset.contains(&[2, 5]));
        assert!(!subset.contains(&[3, 5]));
        assert!(subset.inbounds(&[3, 6]));
        assert!(!subset.inbounds(&[3, 5]));
        assert!(ArraySubset::new_with_start_shape(vec![0], vec![1, 2]).is_err());
        assert_eq!(subset.to_string(), "start [1, 2] shape [2, 4]");
    }

    #[test]
    fn array_subset_overlap() {
        let a = ArraySubset::new_with_ranges(&[0..4, 0..4]);
        let b = ArraySubset::new_with_ranges(&[2..6, 3..5]);
        let overlap = a.overlap(&b).unwrap();
        assert_eq!(overlap, ArraySubset::new_with_ranges(&[2..4, 3..4]));
        assert_eq!(
            overlap.relative_to(&[2, 2]).unwrap(),
            ArraySubset::new_with_ranges(&[0..2, 1..2])
        );

        let c = ArraySubset::new_with_ranges(&[5..6, 0..1]);
        assert!(a.overlap(&c).unwrap().is_empty());
        assert!(a.overlap(&ArraySubset::new_with_shape(vec![1])).is_err());
        assert_eq!(
            b.bound(&[5, 4]).unwrap(),
            ArraySubset::new_with_ranges(&[2..5, 3..4])
        );
    }

    #[test]
    fn array_subset_iter_indices() {
        let subset = ArraySubset::new_with_ranges(&[1..3, 1..3]);
        let mut iter = subset.iter_indices();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.next(), Some(vec![1, 1]));
        assert_eq!(iter.next(), Some(vec![1, 2]));
        assert_eq!(iter.next(), Some(vec![2, 1]));
        assert_eq!(iter.next(), Some(vec![2, 2]));
        assert_eq!(iter.next(), None);

        let scalar = ArraySubset::new_with_shape(vec![]);
        assert_eq!(scalar.iter_indices().collect::<Vec<_>>(), vec![Vec::<u64>::new()]);
        let empty = ArraySubset::new_with_shape(vec![0, 3]);
        assert_eq!(empty.iter_indices().count(), 0);
    }
}
