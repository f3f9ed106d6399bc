use crate::{num_elements, to_usize, ArrayShape};

/// A caller-owned buffer of fixed-size elements used by [`Dataset::read_direct`](super::Dataset::read_direct) and [`Dataset::write_direct`](super::Dataset::write_direct).
///
/// Elements are little-endian and laid out with byte `strides` per dimension.
/// Only buffers which are contiguous in row-major order can be transferred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectBuffer {
    shape: ArrayShape,
    strides: Vec<usize>,
    element_size: usize,
    bytes: Vec<u8>,
}

impl DirectBuffer {
    /// Create a row-major contiguous buffer of `shape` with elements of `element_size` bytes.
    ///
    /// # Panics
    /// Panics if the number of bytes exceeds [`usize::MAX`].
    #[must_use]
    pub fn new(shape: ArrayShape, element_size: usize, bytes: Vec<u8>) -> Self {
        let strides = row_major_strides(&shape, element_size);
        Self {
            shape,
            strides,
            element_size,
            bytes,
        }
    }

    /// Create a zeroed row-major contiguous buffer of `shape` with elements of `element_size` bytes.
    ///
    /// # Panics
    /// Panics if the number of bytes exceeds [`usize::MAX`].
    #[must_use]
    pub fn zeros(shape: ArrayShape, element_size: usize) -> Self {
        let bytes = vec![0; to_usize(num_elements(&shape)) * element_size];
        Self::new(shape, element_size, bytes)
    }

    /// Create a buffer with explicit byte `strides`.
    #[must_use]
    pub fn with_strides(
        shape: ArrayShape,
        strides: Vec<usize>,
        element_size: usize,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            shape,
            strides,
            element_size,
            bytes,
        }
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Returns the byte strides.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the element size in bytes.
    #[must_use]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns the bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the bytes mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume the buffer and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns true if the buffer is contiguous in row-major order.
    ///
    /// Strides of dimensions with an extent of 1 are ignored.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.strides.len() == self.shape.len()
            && itertools::izip!(
                &self.shape,
                &self.strides,
                row_major_strides(&self.shape, self.element_size)
            )
            .all(|(&extent, &stride, expected)| extent <= 1 || stride == expected)
    }
}

fn row_major_strides(shape: &[u64], element_size: usize) -> Vec<usize> {
    let mut strides = vec![element_size; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * to_usize(shape[i + 1]);
    }
    strides
}
