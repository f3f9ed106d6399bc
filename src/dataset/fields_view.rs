use crate::{
    data_type::{ArrayValue, DataType, FieldSelection},
    selection::Selection,
    typed_array::TypedArray,
};

use super::{Dataset, DatasetError};

/// A lazy view of a subset of the fields of a compound dataset.
///
/// A single field has that field's data type, several fields have a compound data type of those fields in the requested order.
/// Reads and writes through the view transfer only the selected fields; other fields are left untouched on write.
#[derive(Clone, Debug)]
pub struct FieldsView<'a> {
    dataset: &'a Dataset,
    fields: FieldSelection,
}

impl<'a> FieldsView<'a> {
    pub(super) fn new(dataset: &'a Dataset, fields: FieldSelection) -> Self {
        Self { dataset, fields }
    }

    /// Returns the selected field names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        self.fields.names()
    }

    /// Returns the data type of the view.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        self.fields.data_type()
    }

    fn with_fields(&self, selection: &Selection) -> Selection {
        selection.clone().with_fields(self.fields.names().iter().cloned())
    }

    /// Read the selected fields of the elements of `selection`.
    ///
    /// # Errors
    /// See [`Dataset::read`].
    pub fn read(&self, selection: &Selection) -> Result<TypedArray, DatasetError> {
        self.dataset.read(&self.with_fields(selection))
    }

    /// Write `data` to the selected fields of the elements of `selection`.
    ///
    /// # Errors
    /// See [`Dataset::write`].
    pub fn write(
        &self,
        selection: &Selection,
        data: impl Into<ArrayValue>,
    ) -> Result<(), DatasetError> {
        self.dataset.write(&self.with_fields(selection), data)
    }
}
