use std::sync::Arc;

use ndstore::{
    data_type::{ArrayValue, DataType},
    dataset::{Dataset, DatasetBuilder},
    dataspace::Chunks,
    filter::{CodecOptions, ScaleOffsetRequest},
    selection::Selection,
    storage::{
        MemoryStore, PerformanceMetricsStorageAdapter, ReadableStorageTraits, WritableStorageTraits,
    },
    ErrorKind,
};

fn ramp(n: i32) -> Vec<i32> {
    (0..n).map(|i| i * 7 % 1000 - 500).collect()
}

fn round_trip(builder: &mut DatasetBuilder) -> Result<Dataset, Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = builder
        .shape(vec![4000])
        .data_type(DataType::int32())
        .chunks(Chunks::Explicit(vec![1000]))
        .build_and_store(store.clone(), "/filtered")?;
    dataset.write(&Selection::all(), ArrayValue::from(ramp(4000)))?;

    let reopened = Dataset::open(store, "/filtered")?;
    let values: Vec<i32> = reopened.read(&Selection::all())?.elements()?;
    assert_eq!(values, ramp(4000));
    let values: Vec<i32> = reopened.par_read(&Selection::all())?.elements()?;
    assert_eq!(values, ramp(4000));
    Ok(reopened)
}

#[cfg(feature = "gzip")]
#[test]
fn filters_gzip_shuffle() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = round_trip(DatasetBuilder::new().compression("gzip").shuffle(true))?;
    assert_eq!(dataset.filters().compression().as_deref(), Some("gzip"));
    assert!(dataset.filters().compression_opts().is_some());
    assert!(dataset.filters().shuffle());

    let dataset = round_trip(DatasetBuilder::new().compression("gzip").compression_opts(vec![9]))?;
    assert_eq!(dataset.filters().compression_opts(), Some(vec![9]));
    Ok(())
}

#[cfg(feature = "gzip")]
#[test]
fn filters_legacy_gzip_level() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = round_trip(DatasetBuilder::new().compression(5i64))?;
    assert_eq!(dataset.filters().compression().as_deref(), Some("gzip"));
    assert_eq!(dataset.filters().compression_opts(), Some(vec![5]));

    let err = DatasetBuilder::new()
        .shape(vec![10])
        .compression(5i64)
        .compression_opts(vec![5])
        .build(Arc::new(MemoryStore::new()), "/conflict")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = DatasetBuilder::new()
        .shape(vec![10])
        .compression("gzip")
        .compression_opts(vec![10])
        .build(Arc::new(MemoryStore::new()), "/level")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    Ok(())
}

#[cfg(feature = "zstd")]
#[test]
fn filters_zstd_fletcher32() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = round_trip(
        DatasetBuilder::new()
            .compression("zstd")
            .compression_opts(vec![3])
            .fletcher32(true),
    )?;
    assert_eq!(dataset.filters().compression().as_deref(), Some("zstd"));
    assert!(dataset.filters().fletcher32());
    Ok(())
}

#[cfg(feature = "lzf")]
#[test]
fn filters_lzf_shuffle() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = round_trip(DatasetBuilder::new().compression("lzf").shuffle(true))?;
    assert_eq!(dataset.filters().compression().as_deref(), Some("lzf"));
    assert_eq!(dataset.filters().compression_opts(), None);
    assert!(dataset.storage_size()? < 4 * 4000);
    Ok(())
}

#[test]
fn filters_unknown_compression() {
    let build = |builder: &mut DatasetBuilder| {
        builder
            .shape(vec![10])
            .build(Arc::new(MemoryStore::new()), "/x")
            .unwrap_err()
    };

    let err = build(DatasetBuilder::new().compression("szip"));
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(err.to_string().contains("Unknown compression"), "{err}");

    let err = build(DatasetBuilder::new().compression(40000i64));
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(err.to_string().contains("Unknown compression"), "{err}");

    let err = build(DatasetBuilder::new().compression(-1i64));
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(err.to_string().contains("Invalid filter"), "{err}");

    let err = build(DatasetBuilder::new().compression_opts(vec![1]));
    assert_eq!(err.kind(), ErrorKind::Value);
}

#[test]
fn filters_allowed_unknown_filter() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = DatasetBuilder::new()
        .shape(vec![8])
        .data_type(DataType::uint8())
        .compression(40000i64)
        .compression_opts(vec![1, 2])
        .allow_unknown_filter(true)
        .build_and_store(store.clone(), "/unknown")?;
    assert_eq!(dataset.filters().compression().as_deref(), Some("40000"));
    assert_eq!(dataset.filters().compression_opts(), Some(vec![1, 2]));

    let err = dataset
        .write(&Selection::all(), ArrayValue::scalar(3))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let passthrough = CodecOptions::builder()
        .unknown_filter_passthrough(true)
        .build();
    dataset.write_opt(&Selection::all(), ArrayValue::scalar(3), &passthrough)?;

    let reopened = Dataset::open(store, "/unknown")?;
    assert_eq!(reopened.filters().compression_opts(), Some(vec![1, 2]));
    assert_eq!(
        reopened.read(&Selection::all()).unwrap_err().kind(),
        ErrorKind::Io
    );
    let values: Vec<u8> = reopened
        .read_opt(&Selection::all(), &passthrough)?
        .elements()?;
    assert_eq!(values, vec![3; 8]);
    Ok(())
}

#[test]
fn filters_scaleoffset() -> Result<(), Box<dyn std::error::Error>> {
    let values = vec![1.234, -5.678, 100.0, 0.001, -0.004, 42.4242];
    let dataset = DatasetBuilder::new()
        .shape(vec![6])
        .data_type(DataType::float64())
        .chunks(Chunks::Explicit(vec![4]))
        .scaleoffset(ScaleOffsetRequest::Factor(2))
        .build_and_store(Arc::new(MemoryStore::new()), "/lossy")?;
    dataset.write(&Selection::all(), ArrayValue::from(values.clone()))?;
    let read: Vec<f64> = dataset.read(&Selection::all())?.elements()?;
    for (expected, actual) in values.iter().zip(&read) {
        assert!((expected - actual).abs() <= 0.005 + f64::EPSILON, "{expected} {actual}");
    }

    let integers = DatasetBuilder::new()
        .shape(vec![5])
        .data_type(DataType::int16())
        .scaleoffset(ScaleOffsetRequest::Auto)
        .build_and_store(Arc::new(MemoryStore::new()), "/packed")?;
    integers.write(&Selection::all(), ArrayValue::from(vec![-3i16, 1000, 7, 7, 12]))?;
    let read: Vec<i16> = integers.read(&Selection::all())?.elements()?;
    assert_eq!(read, vec![-3, 1000, 7, 7, 12]);

    let err = DatasetBuilder::new()
        .shape(vec![5])
        .data_type(DataType::float32())
        .scaleoffset(ScaleOffsetRequest::Auto)
        .build(Arc::new(MemoryStore::new()), "/auto")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = DatasetBuilder::new()
        .shape(vec![5])
        .data_type(DataType::int32())
        .scaleoffset(ScaleOffsetRequest::Factor(-1))
        .build(Arc::new(MemoryStore::new()), "/negative")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    Ok(())
}

#[test]
fn filters_scaleoffset_rejects_before_storing() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(PerformanceMetricsStorageAdapter::new(Arc::new(MemoryStore::new())));
    let dataset = DatasetBuilder::new()
        .shape(vec![4])
        .data_type(DataType::float64())
        .chunks(Chunks::Explicit(vec![2]))
        .scaleoffset(ScaleOffsetRequest::Factor(2))
        .build_and_store(store.clone(), "/quantised")?;
    dataset.write(&Selection::all(), ArrayValue::from(vec![5.0, 6.0, 7.0, 8.0]))?;

    store.reset();
    let err = dataset
        .write(&Selection::all(), ArrayValue::from(vec![1.0, 2.0, f64::NAN, 4.0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = dataset
        .par_write(&Selection::all(), ArrayValue::from(vec![1.0, 2.0, 3.0, 1.0e17]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    assert_eq!(store.writes(), 0);

    let values: Vec<f64> = dataset.read(&Selection::all())?.elements()?;
    assert_eq!(values, vec![5.0, 6.0, 7.0, 8.0]);
    Ok(())
}

#[test]
fn filters_fletcher32_detects_corruption() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = DatasetBuilder::new()
        .shape(vec![16])
        .data_type(DataType::uint32())
        .fletcher32(true)
        .build_and_store(store.clone(), "/checked")?;
    dataset.write(&Selection::all(), ArrayValue::from((0..16u32).collect::<Vec<_>>()))?;

    let key = dataset.chunk_store().chunk_key(&[0]);
    let mut bytes = store.get(&key)?.ok_or("chunk was not stored")?;
    bytes[0] ^= 0xff;
    store.set(&key, bytes)?;

    let err = dataset.read(&Selection::all()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let unchecked = CodecOptions::builder().validate_checksums(false).build();
    let values: Vec<u32> = dataset.read_opt(&Selection::all(), &unchecked)?.elements()?;
    assert_eq!(values[0], 0xff);
    assert_eq!(values[1..], (1..16).collect::<Vec<_>>());
    Ok(())
}
