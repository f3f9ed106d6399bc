//! Batched reads and writes across several datasets.
//!
//! A [`MultiManager`] binds an ordered list of datasets and applies one logical read or write to all of them.
//! Selections are matched positionally, or a single selection is broadcast to every dataset.
//! Each selection is resolved against its own dataset, so datasets may differ in shape, rank and data type.
//!
//! Writes are independent per dataset.
//! A failed write does not stop or roll back the writes to other datasets, and every failure is reported in [`MultiManagerError::Partial`].

use std::sync::Arc;

use log::debug;
use rayon::prelude::*;
use rayon_iter_concurrent_limit::iter_concurrent_limit;
use thiserror::Error;

use crate::{
    data_type::ArrayValue,
    dataset::{chunk_concurrent_limit, Dataset, DatasetError},
    filter::CodecOptions,
    selection::Selection,
    typed_array::TypedArray,
    ErrorKind,
};

/// A [`MultiManager`] error.
#[derive(Debug, Error)]
pub enum MultiManagerError {
    /// The number of selections is neither one nor the number of datasets.
    #[error("expected 1 or {expected} selections, got {got}")]
    SelectionCount {
        /// The number of datasets.
        expected: usize,
        /// The number of selections.
        got: usize,
    },
    /// The number of source arrays is not the number of datasets.
    #[error("expected {expected} source arrays, got {got}")]
    DataCount {
        /// The number of datasets.
        expected: usize,
        /// The number of source arrays.
        got: usize,
    },
    /// A read of one dataset failed.
    #[error("read of dataset {index} failed: {source}")]
    Read {
        /// The position of the dataset.
        index: usize,
        /// The dataset error.
        #[source]
        source: DatasetError,
    },
    /// Writes to some datasets failed. The writes to all other datasets were applied.
    #[error("{} of the dataset writes failed", .failures.len())]
    Partial {
        /// The position of each failed dataset and its error, in dataset order.
        failures: Vec<(usize, DatasetError)>,
    },
}

impl MultiManagerError {
    /// Returns the [`ErrorKind`] of the error.
    ///
    /// A partial failure has the kind of its first failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SelectionCount { .. } | Self::DataCount { .. } => ErrorKind::Value,
            Self::Read { source, .. } => source.kind(),
            Self::Partial { failures } => failures
                .first()
                .map_or(ErrorKind::Value, |(_, err)| err.kind()),
        }
    }
}

/// Reads and writes across an ordered list of datasets.
#[derive(Clone, Debug)]
pub struct MultiManager {
    datasets: Vec<Arc<Dataset>>,
}

impl MultiManager {
    /// Create a multi manager of `datasets`.
    ///
    /// The order of `datasets` is the order of results.
    #[must_use]
    pub fn new(datasets: Vec<Arc<Dataset>>) -> Self {
        Self { datasets }
    }

    /// Returns the datasets.
    #[must_use]
    pub fn datasets(&self) -> &[Arc<Dataset>] {
        &self.datasets
    }

    /// Returns the number of datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Returns true if there are no datasets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Match `selections` to the datasets.
    ///
    /// No selection selects every element, and a single selection is broadcast.
    fn selections<'a>(
        &self,
        selections: &'a [Selection],
    ) -> Result<Vec<&'a Selection>, MultiManagerError> {
        static ALL: Selection = Selection::all();
        match selections {
            [] => Ok(vec![&ALL; self.len()]),
            [selection] => Ok(vec![selection; self.len()]),
            selections if selections.len() == self.len() => Ok(selections.iter().collect()),
            selections => Err(MultiManagerError::SelectionCount {
                expected: self.len(),
                got: selections.len(),
            }),
        }
    }

    fn concurrent_limit(&self) -> usize {
        chunk_concurrent_limit(&CodecOptions::default(), self.len())
    }

    /// Read `selections` from every dataset.
    ///
    /// Returns one array per dataset, in dataset order, with the data type of the dataset (or of the selected fields) and the logical shape of its selection.
    ///
    /// # Errors
    /// Returns a [`MultiManagerError`] if the number of selections is invalid or a read fails.
    pub fn read(&self, selections: &[Selection]) -> Result<Vec<TypedArray>, MultiManagerError> {
        let selections = self.selections(selections)?;
        std::iter::zip(&self.datasets, selections)
            .enumerate()
            .map(|(index, (dataset, selection))| {
                dataset
                    .read(selection)
                    .map_err(|source| MultiManagerError::Read { index, source })
            })
            .collect()
    }

    /// Read `selections` from every dataset, reading datasets concurrently.
    ///
    /// # Errors
    /// See [`MultiManager::read`].
    pub fn par_read(&self, selections: &[Selection]) -> Result<Vec<TypedArray>, MultiManagerError> {
        let selections = self.selections(selections)?;
        let limit = self.concurrent_limit();
        let read_dataset = |index: usize| {
            self.datasets[index]
                .read(selections[index])
                .map_err(|source| MultiManagerError::Read { index, source })
        };
        let indices: Vec<usize> = (0..self.len()).collect();
        iter_concurrent_limit!(limit, indices, map, read_dataset).collect()
    }

    fn check_data(&self, data: &[ArrayValue]) -> Result<(), MultiManagerError> {
        if data.len() == self.len() {
            Ok(())
        } else {
            Err(MultiManagerError::DataCount {
                expected: self.len(),
                got: data.len(),
            })
        }
    }

    fn partial(
        &self,
        failures: Vec<(usize, DatasetError)>,
    ) -> Result<(), MultiManagerError> {
        if failures.is_empty() {
            Ok(())
        } else {
            debug!(
                "{} of {} dataset writes failed",
                failures.len(),
                self.len()
            );
            Err(MultiManagerError::Partial { failures })
        }
    }

    /// Write one source array to `selections` of each dataset.
    ///
    /// Each write is validated and applied independently, as by [`Dataset::write`].
    ///
    /// # Errors
    /// Returns a [`MultiManagerError`] if the number of selections or source arrays is invalid.
    /// Returns [`MultiManagerError::Partial`] listing every failed write if any write fails; all other writes are applied.
    pub fn write(
        &self,
        selections: &[Selection],
        data: Vec<ArrayValue>,
    ) -> Result<(), MultiManagerError> {
        let selections = self.selections(selections)?;
        self.check_data(&data)?;
        let failures = itertools::izip!(&self.datasets, selections, data)
            .enumerate()
            .filter_map(|(index, (dataset, selection, data))| {
                dataset.write(selection, data).err().map(|err| (index, err))
            })
            .collect();
        self.partial(failures)
    }

    /// Write one source array to `selections` of each dataset, writing datasets concurrently.
    ///
    /// There is no ordering between the writes to different datasets.
    ///
    /// # Errors
    /// See [`MultiManager::write`].
    pub fn par_write(
        &self,
        selections: &[Selection],
        data: Vec<ArrayValue>,
    ) -> Result<(), MultiManagerError> {
        let selections = self.selections(selections)?;
        self.check_data(&data)?;
        let limit = self.concurrent_limit();
        let write_dataset = |(index, data): (usize, ArrayValue)| {
            self.datasets[index]
                .write(selections[index], data)
                .err()
                .map(|err| (index, err))
        };
        let data: Vec<(usize, ArrayValue)> = data.into_iter().enumerate().collect();
        let failures: Vec<Option<(usize, DatasetError)>> =
            iter_concurrent_limit!(limit, data, map, write_dataset).collect();
        self.partial(failures.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        data_type::{Charset, CompoundField, DataType, Value},
        dataset::DatasetBuilder,
        selection::SelectionItem,
        storage::MemoryStore,
    };

    use super::*;

    fn datasets() -> Vec<Arc<Dataset>> {
        let store = Arc::new(MemoryStore::new());
        let ints = DatasetBuilder::new()
            .shape(vec![4, 3])
            .data_type(DataType::int32())
            .build_and_store(store.clone(), "/ints")
            .unwrap();
        let floats = DatasetBuilder::new()
            .shape(vec![6])
            .data_type(DataType::float32())
            .build_and_store(store.clone(), "/floats")
            .unwrap();
        let text = DatasetBuilder::new()
            .shape(vec![2])
            .data_type(DataType::fixed_string(4, Charset::Ascii))
            .build_and_store(store, "/text")
            .unwrap();
        vec![Arc::new(ints), Arc::new(floats), Arc::new(text)]
    }

    #[test]
    fn multi_manager_write_read() {
        let manager = MultiManager::new(datasets());
        let selections = [
            Selection::new(vec![SelectionItem::Index(1)]),
            Selection::new(vec![SelectionItem::slice(0, 3)]),
            Selection::new(vec![SelectionItem::slice(0, 2)]),
        ];
        manager
            .write(
                &selections,
                vec![
                    ArrayValue::from(vec![1, 2, 3]),
                    ArrayValue::from(vec![0.5, 1.5, 2.5]),
                    ArrayValue::from(vec![Value::bytes(*b"ab"), Value::bytes(*b"abcd")]),
                ],
            )
            .unwrap();
        let arrays = manager.read(&selections).unwrap();
        assert_eq!(arrays.len(), 3);
        assert_eq!(arrays[0].data_type(), &DataType::int32());
        assert_eq!(arrays[0].elements::<i32>().unwrap(), vec![1, 2, 3]);
        assert_eq!(arrays[1].elements::<f32>().unwrap(), vec![0.5, 1.5, 2.5]);
        assert_eq!(
            arrays[2].to_values().unwrap(),
            vec![Value::bytes(*b"ab"), Value::bytes(*b"abcd")]
        );
        assert_eq!(manager.par_read(&selections).unwrap(), arrays);

        // broadcast of one selection to datasets of different ranks
        let arrays = manager.read(&[Selection::all()]).unwrap();
        assert_eq!(arrays[0].shape(), &[4, 3]);
        assert_eq!(arrays[1].shape(), &[6]);
        assert_eq!(arrays[2].shape(), &[2]);
        assert_eq!(manager.read(&[]).unwrap(), arrays);
    }

    #[test]
    fn multi_manager_counts() {
        let manager = MultiManager::new(datasets());
        let two = [Selection::all(), Selection::all()];
        assert_eq!(manager.read(&two).unwrap_err().kind(), ErrorKind::Value);
        assert_eq!(
            manager
                .write(&[Selection::all()], vec![ArrayValue::scalar(0)])
                .unwrap_err()
                .kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn multi_manager_partial_write() {
        let datasets = datasets();
        let manager = MultiManager::new(datasets.clone());
        let err = manager
            .par_write(
                &[Selection::all()],
                vec![
                    ArrayValue::scalar(7),
                    ArrayValue::scalar("not a number"),
                    ArrayValue::scalar(Value::bytes(*b"toolong")),
                ],
            )
            .unwrap_err();
        let MultiManagerError::Partial { failures } = &err else {
            panic!("expected a partial failure");
        };
        assert_eq!(
            failures.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(err.kind(), ErrorKind::Type);
        // the first write was applied
        let ints = datasets[0].read(&Selection::all()).unwrap();
        assert_eq!(ints.elements::<i32>().unwrap(), vec![7; 12]);
    }

    #[test]
    fn multi_manager_fields() {
        let data_type = DataType::new_compound(vec![
            CompoundField::new("a", DataType::int16()),
            CompoundField::new("b", DataType::float64()),
        ])
        .unwrap();
        let dataset = DatasetBuilder::new()
            .shape(vec![3])
            .data_type(data_type)
            .build_and_store(Arc::new(MemoryStore::new()), "/records")
            .unwrap();
        let manager = MultiManager::new(vec![Arc::new(dataset)]);
        let selection = Selection::all().with_fields(["b"]);
        manager
            .write(
                &[selection.clone()],
                vec![ArrayValue::from(vec![1.0, 2.0, 3.0])],
            )
            .unwrap();
        let arrays = manager.read(&[selection]).unwrap();
        assert_eq!(arrays[0].data_type(), &DataType::float64());
        assert_eq!(arrays[0].elements::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
        let a = manager
            .read(&[Selection::all().with_fields(["a"])])
            .unwrap();
        assert_eq!(a[0].elements::<i16>().unwrap(), vec![0, 0, 0]);
    }
}
