//! Selections.
//!
//! A [`Selection`] addresses a subset of a dataset with one [`SelectionItem`] per dimension, optionally followed by compound field names.
//! It is resolved against a shape into a [`ResolvedSelection`], which maps the selected elements onto chunks with [`ResolvedSelection::chunk_selections`].
//!
//! The logical shape of a selection drops the dimensions addressed by a single index.
//! Selected elements are always visited in row-major order of the logical shape.

use std::ops::{Range, RangeFull};

use thiserror::Error;

use crate::{
    array_subset::{ArraySubset, IndicesIterator},
    chunk_grid::RegularChunkGrid,
    dataspace::MaxExtent,
    num_elements, ravel_indices, ArrayIndices, ArrayShape, ErrorKind,
};

/// A selection along one dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SelectionItem {
    /// A single index. Negative indices count from the end. The dimension is dropped from the logical shape.
    Index(i64),
    /// A slice with Python semantics. Bounds are clamped and negative bounds count from the end.
    Slice {
        /// The start, defaulting to 0.
        start: Option<i64>,
        /// The stop (exclusive), defaulting to the extent.
        stop: Option<i64>,
        /// The step. Must be positive.
        step: i64,
    },
    /// A strictly increasing list of indices.
    Points(Vec<u64>),
    /// Full slices for every dimension not otherwise addressed.
    Ellipsis,
}

impl SelectionItem {
    /// A slice from `start` to `stop` (exclusive).
    #[must_use]
    pub fn slice(start: i64, stop: i64) -> Self {
        Self::Slice {
            start: Some(start),
            stop: Some(stop),
            step: 1,
        }
    }

    /// A slice from `start` to `stop` (exclusive) with `step`.
    #[must_use]
    pub fn slice_step(start: i64, stop: i64, step: i64) -> Self {
        Self::Slice {
            start: Some(start),
            stop: Some(stop),
            step,
        }
    }

    /// A slice covering the whole dimension.
    #[must_use]
    pub fn full() -> Self {
        Self::Slice {
            start: None,
            stop: None,
            step: 1,
        }
    }
}

impl From<i64> for SelectionItem {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<Range<i64>> for SelectionItem {
    fn from(range: Range<i64>) -> Self {
        Self::slice(range.start, range.end)
    }
}

impl From<RangeFull> for SelectionItem {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

impl From<Vec<u64>> for SelectionItem {
    fn from(points: Vec<u64>) -> Self {
        Self::Points(points)
    }
}

/// A selection of dataset elements and compound fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    items: Vec<SelectionItem>,
    fields: Vec<String>,
}

/// A selection error.
#[derive(Clone, Debug, Error)]
pub enum SelectionError {
    /// More than one ellipsis.
    #[error("a selection may contain at most one ellipsis")]
    MultipleEllipsis,
    /// More selection items than dimensions.
    #[error("selection has {items} items but the dataspace has rank {rank}")]
    RankMismatch {
        /// The number of selection items.
        items: usize,
        /// The rank of the dataspace.
        rank: usize,
    },
    /// An index outside of the extent of a dimension.
    #[error("index {index} is out of range for axis {axis} with extent {extent}")]
    IndexOutOfRange {
        /// The index.
        index: i64,
        /// The axis.
        axis: usize,
        /// The extent of the axis.
        extent: u64,
    },
    /// A zero or negative slice step.
    #[error("slice step must be positive, got {0}")]
    InvalidStep(i64),
    /// Points which are not strictly increasing or are out of range.
    #[error("points on axis {0} must be strictly increasing and within the extent")]
    InvalidPoints(usize),
    /// Points on a resizable dimension.
    #[error("points are only supported on dimensions with a bounded maximum extent, not axis {0}")]
    PointsOnResizableAxis(usize),
    /// A selection which is not a contiguous hyperslab.
    #[error("selection must be a contiguous hyperslab with unit steps")]
    NotContiguous,
}

impl SelectionError {
    /// Returns the [`ErrorKind`] of the error, always [`ErrorKind::Value`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Value
    }
}

impl Selection {
    /// Create a new selection from a list of items.
    ///
    /// Dimensions beyond the items are fully selected.
    #[must_use]
    pub fn new(items: Vec<SelectionItem>) -> Self {
        Self {
            items,
            fields: Vec::new(),
        }
    }

    /// Create a selection of every element.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            items: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Return the selection restricted to the compound fields `names`.
    #[must_use]
    pub fn with_fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fields = names.into_iter().map(Into::into).collect();
        self
    }

    /// Return the selection items.
    #[must_use]
    pub fn items(&self) -> &[SelectionItem] {
        &self.items
    }

    /// Return the selected field names. Empty if all fields are selected.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Resolve the selection against a dataspace with `shape` and `maxshape`.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if the selection has more items than `shape` has dimensions, more than one ellipsis, an out of range index, a non-positive step, or invalid points.
    pub fn resolve(
        &self,
        shape: &[u64],
        maxshape: &[MaxExtent],
    ) -> Result<ResolvedSelection, SelectionError> {
        let ellipses = self
            .items
            .iter()
            .filter(|item| matches!(item, SelectionItem::Ellipsis))
            .count();
        if ellipses > 1 {
            return Err(SelectionError::MultipleEllipsis);
        }
        let addressed = self.items.len() - ellipses;
        if addressed > shape.len() {
            return Err(SelectionError::RankMismatch {
                items: addressed,
                rank: shape.len(),
            });
        }

        let full = SelectionItem::full();
        let mut expanded: Vec<&SelectionItem> = Vec::with_capacity(shape.len());
        for item in &self.items {
            if matches!(item, SelectionItem::Ellipsis) {
                expanded.extend(std::iter::repeat(&full).take(shape.len() - addressed));
            } else {
                expanded.push(item);
            }
        }
        expanded.resize(shape.len(), &full);

        let dims = expanded
            .into_iter()
            .enumerate()
            .map(|(axis, item)| {
                let max = maxshape.get(axis).copied().unwrap_or(MaxExtent::Unbounded);
                DimSelection::resolve(item, axis, shape[axis], max)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedSelection { dims })
    }
}

impl From<Vec<SelectionItem>> for Selection {
    fn from(items: Vec<SelectionItem>) -> Self {
        Self::new(items)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DimSelection {
    Index(u64),
    Range { start: u64, step: u64, count: u64 },
    Points(Vec<u64>),
}

impl DimSelection {
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn resolve(
        item: &SelectionItem,
        axis: usize,
        extent: u64,
        max: MaxExtent,
    ) -> Result<Self, SelectionError> {
        let n = extent as i64;
        match item {
            SelectionItem::Index(index) => {
                let resolved = if *index < 0 { index + n } else { *index };
                if (0..n).contains(&resolved) {
                    Ok(Self::Index(resolved as u64))
                } else {
                    Err(SelectionError::IndexOutOfRange {
                        index: *index,
                        axis,
                        extent,
                    })
                }
            }
            SelectionItem::Slice { start, stop, step } => {
                if *step <= 0 {
                    return Err(SelectionError::InvalidStep(*step));
                }
                let clamp = |bound: i64| {
                    if bound < 0 {
                        (bound + n).max(0)
                    } else {
                        bound.min(n)
                    }
                };
                let start = start.map_or(0, clamp);
                let stop = stop.map_or(n, clamp);
                let count = if stop > start {
                    (stop - start - 1) / step + 1
                } else {
                    0
                };
                Ok(Self::Range {
                    start: start as u64,
                    step: *step as u64,
                    count: count as u64,
                })
            }
            SelectionItem::Points(points) => {
                if !matches!(max, MaxExtent::Bounded(_)) {
                    return Err(SelectionError::PointsOnResizableAxis(axis));
                }
                let increasing = points.windows(2).all(|pair| pair[0] < pair[1]);
                if !increasing || points.last().is_some_and(|&last| last >= extent) {
                    return Err(SelectionError::InvalidPoints(axis));
                }
                Ok(Self::Points(points.clone()))
            }
            SelectionItem::Ellipsis => unreachable!("ellipses are expanded before resolution"),
        }
    }

    fn len(&self) -> u64 {
        match self {
            Self::Index(_) => 1,
            Self::Range { count, .. } => *count,
            Self::Points(points) => points.len() as u64,
        }
    }

    fn get(&self, i: u64) -> u64 {
        match self {
            Self::Index(index) => *index,
            Self::Range { start, step, .. } => start + i * step,
            Self::Points(points) => points[crate::to_usize(i)],
        }
    }

    fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// Group the selected indices by chunk, in order.
    fn chunk_groups(&self, chunk_extent: u64) -> Vec<(u64, ChunkDim)> {
        let mut groups: Vec<(u64, ChunkDim)> = Vec::new();
        for (output, index) in self.iter().enumerate() {
            let chunk = index / chunk_extent;
            let local = index % chunk_extent;
            match groups.last_mut() {
                Some((last, dim)) if *last == chunk => {
                    dim.local.push(local);
                    dim.output.push(output as u64);
                }
                _ => groups.push((
                    chunk,
                    ChunkDim {
                        local: vec![local],
                        output: vec![output as u64],
                    },
                )),
            }
        }
        groups
    }
}

/// A selection resolved against a shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSelection {
    dims: Vec<DimSelection>,
}

impl ResolvedSelection {
    /// Return the dimensionality of the selected dataspace.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.dims.len()
    }

    /// Return the logical shape, excluding dimensions addressed by a single index.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.dims
            .iter()
            .filter(|dim| !matches!(dim, DimSelection::Index(_)))
            .map(DimSelection::len)
            .collect()
    }

    /// Return the number of selected indices along every dimension.
    #[must_use]
    pub fn full_shape(&self) -> ArrayShape {
        self.dims.iter().map(DimSelection::len).collect()
    }

    /// Return the number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        num_elements(&self.full_shape())
    }

    /// Returns true if no elements are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    /// Return the selected indices along `axis`.
    ///
    /// # Panics
    /// Panics if `axis` is not less than the dimensionality.
    pub fn indices(&self, axis: usize) -> impl Iterator<Item = u64> + '_ {
        self.dims[axis].iter()
    }

    /// Return the selection as an array subset if it is a contiguous hyperslab with unit steps.
    ///
    /// # Errors
    /// Returns [`SelectionError::NotContiguous`] if any dimension is selected by points or with a step other than 1.
    pub fn to_array_subset(&self) -> Result<ArraySubset, SelectionError> {
        let ranges = self
            .dims
            .iter()
            .map(|dim| match dim {
                DimSelection::Index(index) => Ok(*index..index + 1),
                DimSelection::Range {
                    start,
                    step: 1,
                    count,
                } => Ok(*start..start + count),
                DimSelection::Range { count: 0, start, .. } => Ok(*start..*start),
                DimSelection::Range { .. } | DimSelection::Points(_) => {
                    Err(SelectionError::NotContiguous)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ArraySubset::new_with_ranges(&ranges))
    }

    /// Return the linear indices of the selected elements in an array with `shape`, in logical order.
    ///
    /// `shape` must be the shape the selection was resolved against.
    #[must_use]
    pub fn linear_indices(&self, shape: &[u64]) -> Vec<u64> {
        ArraySubset::new_with_shape(self.full_shape())
            .iter_indices()
            .map(|positions| {
                let indices: ArrayIndices = std::iter::zip(&self.dims, positions)
                    .map(|(dim, i)| dim.get(i))
                    .collect();
                ravel_indices(&indices, shape)
            })
            .collect()
    }

    /// Map the selected elements onto the chunks of `chunk_grid`.
    ///
    /// Chunks are visited in row-major order of their chunk indices.
    #[must_use]
    pub fn chunk_selections(&self, chunk_grid: &RegularChunkGrid) -> ChunkSelections {
        let groups: Vec<Vec<(u64, ChunkDim)>> =
            std::iter::zip(&self.dims, chunk_grid.chunk_shape())
                .map(|(dim, chunk_extent)| dim.chunk_groups(*chunk_extent))
                .collect();
        let counts = groups.iter().map(|groups| groups.len() as u64).collect();
        ChunkSelections {
            groups,
            chunk_shape: chunk_grid.chunk_shape().to_vec(),
            full_shape: self.full_shape(),
            iter: ArraySubset::new_with_shape(counts).iter_indices(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ChunkDim {
    local: Vec<u64>,
    output: Vec<u64>,
}

/// An iterator over the [`ChunkSelection`]s of a [`ResolvedSelection`].
#[derive(Clone, Debug)]
pub struct ChunkSelections {
    groups: Vec<Vec<(u64, ChunkDim)>>,
    chunk_shape: ArrayShape,
    full_shape: ArrayShape,
    iter: IndicesIterator,
}

impl Iterator for ChunkSelections {
    type Item = ChunkSelection;

    fn next(&mut self) -> Option<Self::Item> {
        let group_indices = self.iter.next()?;
        let (chunk_indices, dims): (ArrayIndices, Vec<ChunkDim>) =
            std::iter::zip(&self.groups, group_indices)
            .map(|(groups, i)| groups[crate::to_usize(i)].clone())
            .unzip();
        Some(ChunkSelection {
            chunk_indices,
            dims,
            chunk_shape: self.chunk_shape.clone(),
            full_shape: self.full_shape.clone(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for ChunkSelections {}

/// The selected elements within one chunk.
#[derive(Clone, Debug)]
pub struct ChunkSelection {
    chunk_indices: ArrayIndices,
    dims: Vec<ChunkDim>,
    chunk_shape: ArrayShape,
    full_shape: ArrayShape,
}

/// A contiguous run of elements copied between a chunk and the logical output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CopyRun {
    /// The linear index of the first element in the chunk.
    pub chunk: u64,
    /// The linear index of the first element in the logical output.
    pub output: u64,
    /// The number of elements.
    pub len: u64,
}

impl ChunkSelection {
    /// Return the chunk indices.
    #[must_use]
    pub fn chunk_indices(&self) -> &[u64] {
        &self.chunk_indices
    }

    /// Return the number of selected elements in the chunk.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.dims.iter().map(|dim| dim.local.len() as u64).product()
    }

    /// Returns true if every element of the chunk is selected.
    #[must_use]
    pub fn is_whole_chunk(&self) -> bool {
        std::iter::zip(&self.dims, &self.chunk_shape)
            .all(|(dim, extent)| dim.local.len() as u64 == *extent)
    }

    /// Return the runs of consecutive elements in both the chunk and the logical output.
    pub(crate) fn copy_runs(&self) -> Vec<CopyRun> {
        let Some((last, outer)) = self.dims.split_last() else {
            return vec![CopyRun {
                chunk: 0,
                output: 0,
                len: 1,
            }];
        };

        let mut inner_runs: Vec<CopyRun> = Vec::new();
        for (&local, &output) in std::iter::zip(&last.local, &last.output) {
            match inner_runs.last_mut() {
                Some(run) if run.chunk + run.len == local && run.output + run.len == output => {
                    run.len += 1;
                }
                _ => inner_runs.push(CopyRun {
                    chunk: local,
                    output,
                    len: 1,
                }),
            }
        }

        let outer_counts: ArrayShape = outer.iter().map(|dim| dim.local.len() as u64).collect();
        let chunk_stride = self.chunk_shape.last().copied().unwrap_or(1);
        let output_stride = self.full_shape.last().copied().unwrap_or(1);
        let mut runs = Vec::with_capacity(inner_runs.len());
        for positions in ArraySubset::new_with_shape(outer_counts).iter_indices() {
            let (local, output): (ArrayIndices, ArrayIndices) = std::iter::zip(outer, positions)
                .map(|(dim, i)| {
                    let i = crate::to_usize(i);
                    (dim.local[i], dim.output[i])
                })
                .unzip();
            let chunk_base = ravel_indices(&local, &self.chunk_shape[..outer.len()]) * chunk_stride;
            let output_base =
                ravel_indices(&output, &self.full_shape[..outer.len()]) * output_stride;
            runs.extend(inner_runs.iter().map(|run| CopyRun {
                chunk: chunk_base + run.chunk,
                output: output_base + run.output,
                len: run.len,
            }));
        }
        runs
    }
}

/// An iterator over the regions of the chunks intersecting a hyperslab.
///
/// Chunks are visited in row-major order of their chunk indices.
/// The iterator is restartable by cloning.
#[derive(Clone, Debug)]
pub struct ChunkSlices {
    chunk_grid: RegularChunkGrid,
    region: ArraySubset,
    chunks: IndicesIterator,
}

impl ChunkSlices {
    /// Create an iterator over the chunks of `chunk_grid` intersecting `region`.
    #[must_use]
    pub fn new(chunk_grid: RegularChunkGrid, region: ArraySubset) -> Self {
        let chunks = chunk_grid.chunks_in_array_subset(&region).iter_indices();
        Self {
            chunk_grid,
            region,
            chunks,
        }
    }
}

impl Iterator for ChunkSlices {
    type Item = ArraySubset;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk_indices = self.chunks.next()?;
        let chunk_subset = self.chunk_grid.chunk_subset(&chunk_indices);
        Some(chunk_subset.overlap(&self.region).unwrap_or_default())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for ChunkSlices {}

impl std::iter::FusedIterator for ChunkSlices {}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(shape: &[u64]) -> Vec<MaxExtent> {
        shape.iter().copied().map(MaxExtent::Bounded).collect()
    }

    #[test]
    fn selection_slices() {
        let shape = [10];
        let resolve = |item: SelectionItem| {
            Selection::new(vec![item])
                .resolve(&shape, &fixed(&shape))
                .unwrap()
        };
        assert_eq!(resolve(SelectionItem::slice(2, 5)).shape(), vec![3]);
        assert_eq!(resolve(SelectionItem::slice(-3, 100)).shape(), vec![3]);
        assert_eq!(resolve(SelectionItem::slice(8, 2)).shape(), vec![0]);
        let stepped = resolve(SelectionItem::slice_step(1, 10, 3));
        assert_eq!(stepped.indices(0).collect::<Vec<_>>(), vec![1, 4, 7]);
        let huge_step = resolve(SelectionItem::slice_step(0, 10, i64::MAX));
        assert_eq!(huge_step.shape(), vec![1]);
        assert_eq!(huge_step.indices(0).collect::<Vec<_>>(), vec![0]);
        let huge_step = resolve(SelectionItem::slice_step(-1, i64::MAX, i64::MAX));
        assert_eq!(huge_step.indices(0).collect::<Vec<_>>(), vec![9]);
        assert_eq!(resolve(SelectionItem::Index(-1)).shape(), Vec::<u64>::new());
        assert_eq!(resolve(SelectionItem::Index(-1)).indices(0).next(), Some(9));

        let err = Selection::new(vec![SelectionItem::slice_step(0, 5, 0)])
            .resolve(&shape, &fixed(&shape))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(Selection::new(vec![SelectionItem::Index(10)])
            .resolve(&shape, &fixed(&shape))
            .is_err());
        assert!(Selection::new(vec![SelectionItem::Index(-11)])
            .resolve(&shape, &fixed(&shape))
            .is_err());
    }

    #[test]
    fn selection_rank_and_ellipsis() {
        let shape = [4, 5, 6];
        let selection = Selection::new(vec![SelectionItem::Ellipsis, SelectionItem::Index(2)]);
        let resolved = selection.resolve(&shape, &fixed(&shape)).unwrap();
        assert_eq!(resolved.shape(), vec![4, 5]);
        assert_eq!(resolved.full_shape(), vec![4, 5, 1]);

        let resolved = Selection::new(vec![SelectionItem::Index(1)])
            .resolve(&shape, &fixed(&shape))
            .unwrap();
        assert_eq!(resolved.shape(), vec![5, 6]);

        let too_many = Selection::new(vec![SelectionItem::full(); 4]);
        assert!(too_many.resolve(&shape, &fixed(&shape)).is_err());
        let ellipses = Selection::new(vec![SelectionItem::Ellipsis, SelectionItem::Ellipsis]);
        assert!(matches!(
            ellipses.resolve(&shape, &fixed(&shape)),
            Err(SelectionError::MultipleEllipsis)
        ));

        let scalar = Selection::all().resolve(&[], &[]).unwrap();
        assert_eq!(scalar.num_elements(), 1);
        assert!(Selection::new(vec![SelectionItem::Ellipsis])
            .resolve(&[], &[])
            .is_ok());
        assert!(Selection::new(vec![SelectionItem::Index(0)])
            .resolve(&[], &[])
            .is_err());
    }

    #[test]
    fn selection_points() {
        let shape = [10];
        let resolved = Selection::new(vec![vec![1_u64, 3, 8].into()])
            .resolve(&shape, &fixed(&shape))
            .unwrap();
        assert_eq!(resolved.shape(), vec![3]);
        assert!(resolved.to_array_subset().is_err());

        for points in [vec![3_u64, 1], vec![1, 1], vec![10]] {
            let err = Selection::new(vec![points.into()])
                .resolve(&shape, &fixed(&shape))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Value);
        }
        assert!(matches!(
            Selection::new(vec![vec![1_u64].into()]).resolve(&shape, &[MaxExtent::Unbounded]),
            Err(SelectionError::PointsOnResizableAxis(0))
        ));
    }

    #[test]
    fn selection_chunk_selections() {
        let shape = [6, 6];
        let resolved = Selection::new(vec![SelectionItem::slice(1, 5), SelectionItem::Index(3)])
            .resolve(&shape, &fixed(&shape))
            .unwrap();
        let grid = RegularChunkGrid::new(vec![4, 4]);
        let chunks: Vec<_> = resolved.chunk_selections(&grid).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_indices(), &[0, 0]);
        assert_eq!(chunks[1].chunk_indices(), &[1, 0]);
        assert_eq!(chunks[0].num_elements(), 3);
        assert_eq!(
            chunks[0].copy_runs(),
            vec![
                CopyRun { chunk: 7, output: 0, len: 1 },
                CopyRun { chunk: 11, output: 1, len: 1 },
                CopyRun { chunk: 15, output: 2, len: 1 },
            ]
        );
        assert_eq!(
            chunks[1].copy_runs(),
            vec![CopyRun { chunk: 3, output: 3, len: 1 }]
        );
    }

    #[test]
    fn selection_chunk_selections_runs() {
        let shape = [4, 8];
        let resolved = Selection::all().resolve(&shape, &fixed(&shape)).unwrap();
        let grid = RegularChunkGrid::new(vec![2, 4]);
        let chunks: Vec<_> = resolved.chunk_selections(&grid).collect();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(ChunkSelection::is_whole_chunk));
        assert_eq!(
            chunks[1].copy_runs(),
            vec![
                CopyRun { chunk: 0, output: 4, len: 4 },
                CopyRun { chunk: 4, output: 12, len: 4 },
            ]
        );

        let scalar = Selection::all().resolve(&[], &[]).unwrap();
        let chunks: Vec<_> = scalar
            .chunk_selections(&RegularChunkGrid::new(vec![]))
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].copy_runs(),
            vec![CopyRun { chunk: 0, output: 0, len: 1 }]
        );
    }

    #[test]
    fn selection_linear_indices() {
        let shape = [3, 4];
        let resolved = Selection::new(vec![SelectionItem::slice(1, 3), vec![0_u64, 2].into()])
            .resolve(&shape, &fixed(&shape))
            .unwrap();
        assert_eq!(resolved.linear_indices(&shape), vec![4, 6, 8, 10]);
    }

    #[test]
    fn chunk_slices() {
        let grid = RegularChunkGrid::new(vec![4]);
        let slices = ChunkSlices::new(grid, ArraySubset::new_with_ranges(&[2..10]));
        assert_eq!(slices.len(), 3);
        let restarted = slices.clone();
        let regions: Vec<_> = slices.collect();
        assert_eq!(
            regions,
            vec![
                ArraySubset::new_with_ranges(&[2..4]),
                ArraySubset::new_with_ranges(&[4..8]),
                ArraySubset::new_with_ranges(&[8..10]),
            ]
        );
        assert_eq!(restarted.count(), 3);
    }
}
