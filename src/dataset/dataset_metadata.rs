use serde::{Deserialize, Serialize};

use crate::{
    data_type::{DataType, FillValue},
    dataspace::{ChunkLayout, Dataspace},
    filter::FilterMetadata,
};

/// The current dataset metadata format version.
pub const DATASET_FORMAT_VERSION: u32 = 1;

/// Dataset metadata.
///
/// The persisted record of a dataset, stored as JSON at `<path>/.dataset`.
///
/// An example `JSON` document for a chunked, gzip compressed dataset:
/// ```json
/// {
///     "format_version": 1,
///     "data_type": { "class": "integer", "width": 4, "signed": true },
///     "dataspace": { "class": "simple", "shape": [100], "maxshape": ["unbounded"] },
///     "layout": { "layout": "chunked", "chunk_shape": [50] },
///     "fill_value": [0, 0, 0, 0],
///     "filters": [ { "id": 1, "name": "gzip", "configuration": { "level": 4 } } ]
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatasetMetadata {
    /// The metadata format version.
    pub format_version: u32,
    /// The element data type.
    pub data_type: DataType,
    /// The dataspace.
    pub dataspace: Dataspace,
    /// The storage layout.
    pub layout: ChunkLayout,
    /// The fill value element bytes.
    pub fill_value: FillValue,
    /// The filter pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterMetadata>,
}
