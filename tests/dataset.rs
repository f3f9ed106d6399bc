use std::sync::Arc;

use ndstore::{
    data_type::{ArrayValue, DataType, Value},
    dataset::{Dataset, DatasetBuilder, DirectBuffer},
    dataspace::{Chunks, MaxExtent},
    group::Group,
    selection::{Selection, SelectionItem},
    storage::{
        ListableStorageTraits, MaybeBytes, MemoryStore, PerformanceMetricsStorageAdapter,
        ReadableStorageTraits, StorageError, StoreKey, StoreKeys, StorePrefix,
        WritableStorageTraits,
    },
    ErrorKind,
};

fn slice(start: i64, stop: i64) -> Selection {
    Selection::new(vec![SelectionItem::slice(start, stop)])
}

#[test]
fn dataset_partial_writes_and_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let group = Group::new(store.clone())?;
    let dataset = group.create_dataset(
        "x",
        DatasetBuilder::new()
            .shape(vec![100])
            .data_type(DataType::int32())
            .chunks(Chunks::Explicit(vec![16]))
            .compression("gzip")
            .shuffle(true),
    )?;

    dataset.write(&slice(50, 60), ArrayValue::from((0..10).collect::<Vec<i32>>()))?;
    dataset.write(&slice(90, 100), ArrayValue::from((100..110).collect::<Vec<i32>>()))?;

    let reopened = Dataset::open(store, "/x")?;
    assert_eq!(reopened.metadata(), dataset.metadata());
    assert_eq!(reopened.filters().compression().as_deref(), Some("gzip"));
    assert!(reopened.filters().shuffle());

    let values: Vec<i32> = reopened.read(&Selection::all())?.elements()?;
    let mut expected = vec![0; 100];
    expected[50..60].copy_from_slice(&(0..10).collect::<Vec<_>>());
    expected[90..100].copy_from_slice(&(100..110).collect::<Vec<_>>());
    assert_eq!(values, expected);

    let negative: Vec<i32> = reopened.read(&slice(-5, -1))?.elements()?;
    assert_eq!(negative, vec![105, 106, 107, 108]);
    Ok(())
}

#[test]
fn dataset_unwritten_chunks_are_not_stored() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsStorageAdapter::new(Arc::new(
        MemoryStore::new(),
    )));
    let dataset = DatasetBuilder::new()
        .shape(vec![8, 8])
        .data_type(DataType::float64())
        .fill_value(-1.0)
        .chunks(Chunks::Explicit(vec![4, 4]))
        .build_and_store(store.clone(), "/fill")?;
    store.reset();

    let values: Vec<f64> = dataset.read(&Selection::all())?.elements()?;
    assert_eq!(values, vec![-1.0; 64]);
    assert_eq!(store.reads(), 4);
    assert_eq!(store.writes(), 0);

    // a write covering a whole chunk does not read it
    store.reset();
    dataset.write(
        &Selection::new(vec![SelectionItem::slice(0, 4), SelectionItem::slice(4, 8)]),
        ArrayValue::scalar(2.0),
    )?;
    assert_eq!(store.reads(), 0);
    assert_eq!(store.writes(), 1);
    Ok(())
}

#[test]
fn dataset_resize_reclaims_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsStorageAdapter::new(Arc::new(
        MemoryStore::new(),
    )));
    let dataset = DatasetBuilder::new()
        .shape(vec![6, 6])
        .maxshape(vec![MaxExtent::Unbounded, MaxExtent::Bounded(6)])
        .data_type(DataType::uint16())
        .fill_value(9)
        .chunks(Chunks::Explicit(vec![2, 3]))
        .build_and_store(store.clone(), "/r")?;
    dataset.write(&Selection::all(), ArrayValue::scalar(1))?;
    assert_eq!(dataset.chunk_store().stored_chunks()?.len(), 6);

    store.reset();
    dataset.resize(vec![3, 6])?;
    // rows 4.. are erased unread, the chunks of rows 2..4 are truncated
    assert_eq!(store.erases(), 2);
    assert_eq!(store.reads(), 2);
    assert_eq!(dataset.chunk_store().stored_chunks()?.len(), 4);

    dataset.resize(vec![10, 6])?;
    let values: Vec<u16> = dataset.read(&Selection::all())?.elements()?;
    for (i, value) in values.into_iter().enumerate() {
        let expected = if i < 18 { 1 } else { 9 };
        assert_eq!(value, expected, "element {i}");
    }

    assert_eq!(dataset.resize(vec![10, 7]).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(dataset.resize(vec![10]).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(dataset.resize_axis(4, 2).unwrap_err().kind(), ErrorKind::Value);
    Ok(())
}

#[test]
fn dataset_auto_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![0, 1000])
        .maxshape(vec![MaxExtent::Unbounded, MaxExtent::Bounded(1000)])
        .data_type(DataType::float64())
        .build_and_store(Arc::new(MemoryStore::new()), "/auto")?;
    let chunks = dataset.chunks().ok_or("expected a chunked dataset")?;
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|&c| c >= 1));
    assert!(chunks[1] <= 1000);
    assert!(dataset.is_empty());
    assert_eq!(dataset.read(&Selection::all())?.shape(), &[0, 1000]);

    dataset.resize_axis(3, 0)?;
    dataset.write(&Selection::new(vec![SelectionItem::Index(2)]), ArrayValue::scalar(1.5))?;
    let row: Vec<f64> = dataset.read(&Selection::new(vec![SelectionItem::Index(-1)]))?.elements()?;
    assert_eq!(row, vec![1.5; 1000]);
    Ok(())
}

#[test]
fn dataset_coercion_is_validated_before_writing() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsStorageAdapter::new(Arc::new(
        MemoryStore::new(),
    )));
    let dataset = DatasetBuilder::new()
        .shape(vec![4])
        .data_type(DataType::uint8())
        .build_and_store(store.clone(), "/u8")?;
    store.reset();

    let err = dataset
        .write(&Selection::all(), ArrayValue::from(vec![1, 2, 300, 4]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    let err = dataset
        .write(&Selection::all(), ArrayValue::from(vec![1, -1, 3, 4]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    let err = dataset
        .write(&Selection::all(), ArrayValue::scalar("text"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(store.writes(), 0);

    dataset.write(&Selection::all(), ArrayValue::from(vec![0.9, 1.5, 2.99, 255.0]))?;
    let values: Vec<u8> = dataset.read(&Selection::all())?.elements()?;
    assert_eq!(values, vec![0, 1, 2, 255]);

    let widened = dataset.read_as(&slice(1, 3), &DataType::float32())?;
    assert_eq!(widened.elements::<f32>()?, vec![1.0, 2.0]);
    assert_eq!(
        dataset
            .read_as(&Selection::all(), &DataType::int8())
            .unwrap_err()
            .kind(),
        ErrorKind::Range
    );
    Ok(())
}

#[test]
fn dataset_selection_errors() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![5, 5])
        .maxshape(vec![MaxExtent::Unbounded, MaxExtent::Bounded(5)])
        .data_type(DataType::int8())
        .build_and_store(Arc::new(MemoryStore::new()), "/s")?;
    let read = |items: Vec<SelectionItem>| dataset.read(&Selection::new(items));

    assert_eq!(read(vec![SelectionItem::Index(5)]).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(
        read(vec![SelectionItem::full(); 3]).unwrap_err().kind(),
        ErrorKind::Value
    );
    assert_eq!(
        read(vec![SelectionItem::slice_step(0, 5, 0)]).unwrap_err().kind(),
        ErrorKind::Value
    );
    // points are not allowed on a resizable axis
    assert_eq!(
        read(vec![SelectionItem::Points(vec![0, 1])]).unwrap_err().kind(),
        ErrorKind::Value
    );
    let points = read(vec![SelectionItem::full(), SelectionItem::Points(vec![1, 4])])?;
    assert_eq!(points.shape(), &[5, 2]);
    let ellipsis = read(vec![SelectionItem::Ellipsis, SelectionItem::Index(0)])?;
    assert_eq!(ellipsis.shape(), &[5]);
    Ok(())
}

#[test]
fn dataset_direct_transfer() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .data(ArrayValue::new(vec![3, 4], (0..12).map(Value::Int).collect())?)
        .data_type(DataType::int16())
        .build_and_store(Arc::new(MemoryStore::new()), "/direct")?;

    let mut dest = DirectBuffer::zeros(vec![2, 4], 2);
    dataset.read_direct(
        &mut dest,
        &Selection::new(vec![SelectionItem::slice(1, 3)]),
        &Selection::all(),
    )?;
    let values: Vec<i16> = dest
        .bytes()
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(values, (4..12).collect::<Vec<_>>());

    let head = Selection::new(vec![SelectionItem::Index(0), SelectionItem::slice(0, 2)]);
    let source = DirectBuffer::new(
        vec![2],
        2,
        [-1i16, -2].iter().flat_map(|v| v.to_le_bytes()).collect(),
    );
    dataset.write_direct(&source, &Selection::all(), &head)?;
    let row: Vec<i16> = dataset.read(&Selection::new(vec![SelectionItem::Index(0)]))?.elements()?;
    assert_eq!(row, vec![-1, -2, 2, 3]);

    let short = DirectBuffer::new(vec![2], 2, vec![0; 3]);
    assert_eq!(
        dataset
            .write_direct(&short, &Selection::all(), &head)
            .unwrap_err()
            .kind(),
        ErrorKind::Value
    );
    Ok(())
}

#[test]
fn dataset_chunk_queries() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![10, 10])
        .data_type(DataType::uint8())
        .chunks(Chunks::Explicit(vec![4, 5]))
        .build_and_store(Arc::new(MemoryStore::new()), "/chunked")?;
    assert_eq!(dataset.num_chunks()?, 0);
    assert_eq!(dataset.storage_size()?, 0);
    assert_eq!(dataset.chunk_info_by_coord(&[0, 0])?, None);

    dataset.write(
        &Selection::new(vec![SelectionItem::Index(9), SelectionItem::Index(0)]),
        ArrayValue::scalar(1),
    )?;
    dataset.write(
        &Selection::new(vec![SelectionItem::Index(0), SelectionItem::Index(7)]),
        ArrayValue::scalar(1),
    )?;
    assert_eq!(dataset.num_chunks()?, 2);
    let first = dataset.chunk_info(0)?;
    assert_eq!(first.chunk_offset, vec![0, 5]);
    assert_eq!(first.size, 20);
    assert_eq!(dataset.chunk_info(1)?.chunk_offset, vec![8, 0]);
    assert_eq!(dataset.storage_size()?, 40);
    assert_eq!(dataset.chunk_info_by_coord(&[3, 9])?, Some(first));
    assert_eq!(dataset.chunk_info_by_coord(&[5, 5])?, None);

    assert_eq!(dataset.chunk_info(2).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(
        dataset.chunk_info_by_coord(&[10, 0]).unwrap_err().kind(),
        ErrorKind::Value
    );
    assert_eq!(
        dataset.chunk_info_by_coord(&[0]).unwrap_err().kind(),
        ErrorKind::Value
    );

    let null = DatasetBuilder::new()
        .null()
        .build_and_store(Arc::new(MemoryStore::new()), "/null")?;
    assert_eq!(null.storage_size()?, 0);
    assert_eq!(null.num_chunks().unwrap_err().kind(), ErrorKind::Type);
    Ok(())
}

#[derive(Debug, Default)]
struct FailingChunkStore {
    inner: MemoryStore,
}

fn transport_failure(key: &StoreKey) -> Result<(), StorageError> {
    if key.as_str().contains("/c/") {
        Err(StorageError::Other(format!("transport failure for {key}")))
    } else {
        Ok(())
    }
}

impl ReadableStorageTraits for FailingChunkStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        transport_failure(key)?;
        self.inner.get(key)
    }
}

impl WritableStorageTraits for FailingChunkStore {
    fn set(&self, key: &StoreKey, value: Vec<u8>) -> Result<(), StorageError> {
        transport_failure(key)?;
        self.inner.set(key, value)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.inner.erase(key)
    }
}

impl ListableStorageTraits for FailingChunkStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.inner.list_prefix(prefix)
    }
}

#[test]
fn dataset_transport_errors_propagate() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![10])
        .maxshape(vec![MaxExtent::Unbounded])
        .data_type(DataType::int32())
        .chunks(Chunks::Explicit(vec![5]))
        .build_and_store(Arc::new(FailingChunkStore::default()), "/failing")?;
    assert_eq!(
        dataset.read(&Selection::all()).unwrap_err().kind(),
        ErrorKind::Io
    );
    assert_eq!(
        dataset
            .write(&Selection::all(), ArrayValue::scalar(1))
            .unwrap_err()
            .kind(),
        ErrorKind::Io
    );
    assert_eq!(
        dataset
            .par_write(&Selection::all(), ArrayValue::scalar(1))
            .unwrap_err()
            .kind(),
        ErrorKind::Io
    );
    // validation errors take precedence over transport errors
    assert_eq!(
        dataset
            .write(&Selection::all(), ArrayValue::scalar("x"))
            .unwrap_err()
            .kind(),
        ErrorKind::Type
    );
    Ok(())
}

#[test]
fn dataset_metadata_is_stored_before_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FailingChunkStore::default());
    let err = DatasetBuilder::new()
        .data((1..=10).collect::<Vec<i32>>())
        .maxshape(vec![MaxExtent::Unbounded])
        .data_type(DataType::int32())
        .chunks(Chunks::Explicit(vec![5]))
        .build_and_store(store.clone(), "/failing")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    let dataset = Dataset::open(store.clone(), "/failing")?;
    assert_eq!(dataset.shape(), Some(vec![10]));

    for chunk in [0, 1] {
        let key = dataset.chunk_store().chunk_key(&[chunk]);
        store.inner.set(&key, vec![0; 20])?;
    }
    let err = dataset.resize(vec![3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(dataset.shape(), Some(vec![3]));
    assert_eq!(Dataset::open(store, "/failing")?.shape(), Some(vec![3]));
    Ok(())
}

#[test]
fn dataset_require_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let first = group.require_dataset("foo", vec![10, 3], &DataType::float32(), true)?;
    let second = group.require_dataset("foo", vec![10, 3], &DataType::float32(), true)?;
    assert!(Arc::ptr_eq(&first, &second));
    let err = group
        .require_dataset("foo", vec![10, 4], &DataType::float32(), true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    Ok(())
}
