//! A chunked, typed, N-dimensional array storage engine.
//!
//! `ndstore` persists large, resizable, multi-dimensional arrays as a collection of independently addressable chunks.
//! Each chunk is passed through an optional [filter pipeline](filter) (byte shuffling, compression, lossy quantization, checksums) before it reaches a [store](storage).
//!
//! ## Getting Started
//! - [`group::Group`] hosts datasets in a store and implements `create`/`require` semantics.
//! - [`dataset::Dataset`] exposes read/write/resize/iterate over [`selection::Selection`]s.
//! - [`multi_manager::MultiManager`] performs one logical read or write across several datasets.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use ndstore::{
//!     data_type::{ArrayValue, DataType},
//!     dataset::DatasetBuilder,
//!     group::Group,
//!     selection::{Selection, SelectionItem},
//!     storage::MemoryStore,
//! };
//!
//! let group = Group::new(Arc::new(MemoryStore::new()))?;
//! let dataset = group.create_dataset(
//!     "temperature",
//!     DatasetBuilder::new()
//!         .shape(vec![100])
//!         .data_type(DataType::float32())
//!         .compression("gzip"),
//! )?;
//!
//! dataset.write(
//!     &Selection::new(vec![SelectionItem::slice(10, 20)]),
//!     ArrayValue::from((0..10).map(f64::from).collect::<Vec<_>>()),
//! )?;
//! let values: Vec<f32> = dataset
//!     .read(&Selection::new(vec![SelectionItem::slice(8, 12)]))?
//!     .elements()?;
//! assert_eq!(values, vec![0.0, 0.0, 0.0, 1.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - Filters: `gzip`, `lzf`, `zstd`.
//!
//! ## Logging
//! Records are emitted through the [`log`] facade. Install any logger to see chunk level activity, or wrap a store in a [`storage::UsageLogStorageAdapter`].

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array_bytes;
pub mod array_subset;
pub mod chunk_grid;
pub mod chunk_store;
pub mod config;
pub mod data_type;
pub mod dataset;
pub mod dataspace;
pub mod filter;
pub mod group;
pub mod multi_manager;
pub mod node;
pub mod selection;
pub mod storage;
pub mod typed_array;

mod error_kind;

pub use error_kind::ErrorKind;

/// An array shape. Dimensions may be zero.
pub type ArrayShape = Vec<u64>;

/// An array index.
pub type ArrayIndices = Vec<u64>;

/// Convert a `u64` extent or count to `usize`.
///
/// # Panics
/// Panics if `value` exceeds [`usize::MAX`].
#[must_use]
pub(crate) fn to_usize(value: u64) -> usize {
    usize::try_from(value).expect("value exceeds usize::MAX")
}

/// Return the number of elements in an array with `shape`.
#[must_use]
pub(crate) fn num_elements(shape: &[u64]) -> u64 {
    shape.iter().product()
}

/// Ravel `indices` into a linear (row-major) index in an array with `shape`.
#[must_use]
pub(crate) fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// Unravel a linear (row-major) `index` into indices in an array with `shape`.
#[must_use]
pub(crate) fn unravel_index(mut index: u64, shape: &[u64]) -> ArrayIndices {
    let mut indices = vec![0; shape.len()];
    for (indices_i, &dim) in std::iter::zip(indices.iter_mut().rev(), shape.iter().rev()) {
        if dim != 0 {
            *indices_i = index % dim;
            index /= dim;
        }
    }
    indices
}
