//! Tests which change the global configuration.
//!
//! These run in their own test binary so that no other test observes the changed configuration.

use std::sync::Arc;

use ndstore::{
    config::{global_config, global_config_mut},
    data_type::{ArrayValue, DataType},
    dataset::DatasetBuilder,
    filter::CodecOptions,
    selection::Selection,
    storage::{MemoryStore, ReadableStorageTraits, WritableStorageTraits},
    ErrorKind,
};

/// Restores the global checksum validation setting when dropped.
struct ValidateChecksumsGuard(bool);

impl ValidateChecksumsGuard {
    fn set(validate_checksums: bool) -> Self {
        let mut config = global_config_mut();
        let previous = config.validate_checksums();
        config.set_validate_checksums(validate_checksums);
        Self(previous)
    }
}

impl Drop for ValidateChecksumsGuard {
    fn drop(&mut self) {
        global_config_mut().set_validate_checksums(self.0);
    }
}

#[test]
fn config_validate_checksums() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dataset = DatasetBuilder::new()
        .shape(vec![4])
        .data_type(DataType::uint32())
        .fletcher32(true)
        .build_and_store(store.clone(), "/checked")?;
    dataset.write(&Selection::all(), ArrayValue::from(vec![1u32, 2, 3, 4]))?;
    let key = dataset.chunk_store().chunk_key(&[0]);
    let mut bytes = store.get(&key)?.ok_or("chunk was not stored")?;
    bytes[4] ^= 0x01;
    store.set(&key, bytes)?;

    assert!(global_config().validate_checksums());
    assert_eq!(
        dataset.read(&Selection::all()).unwrap_err().kind(),
        ErrorKind::Io
    );
    {
        let _guard = ValidateChecksumsGuard::set(false);
        assert!(!global_config().validate_checksums());
        assert!(!CodecOptions::default().validate_checksums());
        let values: Vec<u32> = dataset.read(&Selection::all())?.elements()?;
        assert_eq!(values, vec![1, 3, 3, 4]);
    }
    assert!(global_config().validate_checksums());
    Ok(())
}
