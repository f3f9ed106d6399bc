use std::sync::Arc;

use ndstore::{
    data_type::{ArrayValue, Charset, DataType, Value},
    dataset::{DatasetBuilder, DecodeErrors},
    dataspace::Chunks,
    group::Group,
    multi_manager::{MultiManager, MultiManagerError},
    selection::{Selection, SelectionItem},
    storage::MemoryStore,
    ErrorKind,
};

fn manager(group: &Group) -> Result<MultiManager, Box<dyn std::error::Error>> {
    let grid = group.create_dataset(
        "grid",
        DatasetBuilder::new()
            .shape(vec![20, 30])
            .data_type(DataType::float32())
            .chunks(Chunks::Explicit(vec![7, 8]))
            .compression("gzip"),
    )?;
    let counts = group.create_dataset(
        "counts",
        DatasetBuilder::new()
            .shape(vec![50])
            .data_type(DataType::uint16())
            .fill_value(7),
    )?;
    let labels = group.create_dataset(
        "labels",
        DatasetBuilder::new()
            .shape(vec![3])
            .data_type(DataType::vlen_string(Charset::Utf8)),
    )?;
    let codes = group.create_dataset(
        "codes",
        DatasetBuilder::new()
            .shape(vec![3])
            .data_type(DataType::fixed_string(4, Charset::Ascii)),
    )?;
    Ok(MultiManager::new(vec![grid, counts, labels, codes]))
}

fn sources() -> Vec<ArrayValue> {
    vec![
        ArrayValue::scalar(0.5),
        ArrayValue::from((0..50u16).collect::<Vec<_>>()),
        ArrayValue::from(vec!["\u{3b1}", "beta", "\u{263a}"]),
        ArrayValue::from(vec!["abcd", "ef", ""]),
    ]
}

#[test]
fn multi_manager_read_after_write() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let manager = manager(&group)?;
    manager.write(&[], sources())?;

    let arrays = manager.read(&[])?;
    assert_eq!(arrays.len(), 4);
    assert_eq!(arrays[0].shape(), &[20, 30]);
    assert_eq!(arrays[0].elements::<f32>()?, vec![0.5; 600]);
    assert_eq!(arrays[1].elements::<u16>()?, (0..50).collect::<Vec<_>>());
    assert_eq!(
        arrays[3].to_values()?,
        vec![
            Value::bytes(b"abcd".to_vec()),
            Value::bytes(b"ef".to_vec()),
            Value::bytes(Vec::new())
        ]
    );

    let labels = group.dataset("labels")?;
    let text = labels
        .asstr(None, DecodeErrors::Strict)?
        .read(&Selection::all())?;
    assert_eq!(text, vec!["\u{3b1}", "beta", "\u{263a}"]);
    Ok(())
}

#[test]
fn multi_manager_par_matches_serial() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let manager = manager(&group)?;
    manager.par_write(&[], sources())?;

    let head = Selection::new(vec![SelectionItem::slice(0, 2)]);
    let serial = manager.read(std::slice::from_ref(&head))?;
    let parallel = manager.par_read(std::slice::from_ref(&head))?;
    assert_eq!(serial, parallel);
    assert_eq!(serial[0].shape(), &[2, 30]);
    assert_eq!(serial[1].elements::<u16>()?, vec![0, 1]);
    Ok(())
}

#[test]
fn multi_manager_partial_failure() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let manager = manager(&group)?;
    let mut data = sources();
    data[1] = ArrayValue::scalar(-1);
    data[3] = ArrayValue::scalar("toolong");

    let err = manager.write(&[], data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    let MultiManagerError::Partial { failures } = err else {
        panic!("expected a partial failure");
    };
    let failed: Vec<usize> = failures.iter().map(|(index, _)| *index).collect();
    assert_eq!(failed, vec![1, 3]);
    assert_eq!(failures[1].1.kind(), ErrorKind::Value);

    // the other writes were applied
    let arrays = manager.read(&[])?;
    assert_eq!(arrays[0].elements::<f32>()?, vec![0.5; 600]);
    assert_eq!(arrays[1].elements::<u16>()?, vec![7; 50]);
    Ok(())
}

#[test]
fn multi_manager_argument_counts() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let manager = manager(&group)?;
    let two = vec![Selection::all(), Selection::all()];
    assert_eq!(manager.read(&two).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(
        manager.write(&[], sources()[..2].to_vec()).unwrap_err().kind(),
        ErrorKind::Value
    );
    // a failed read reports the failing dataset
    let err = manager
        .read(&[Selection::new(vec![SelectionItem::Index(25)])])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    assert!(matches!(err, MultiManagerError::Read { index: 0, .. }));
    Ok(())
}
