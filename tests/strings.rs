use std::sync::Arc;

use ndstore::{
    data_type::{ArrayValue, Charset, DataType, Value},
    dataset::{DatasetBuilder, DecodeErrors, TextCodec},
    group::Group,
    selection::{Selection, SelectionItem},
    storage::MemoryStore,
    ErrorKind,
};

#[test]
fn strings_fixed_ascii() -> Result<(), Box<dyn std::error::Error>> {
    let group = Group::new(Arc::new(MemoryStore::new()))?;
    let dataset = group.create_dataset(
        "names",
        DatasetBuilder::new()
            .shape(vec![3])
            .data_type(DataType::fixed_string(5, Charset::Ascii)),
    )?;
    dataset.write(&Selection::all(), ArrayValue::from(vec!["ab", "", "abcde"]))?;

    let values = dataset.read(&Selection::all())?.to_values()?;
    assert_eq!(
        values,
        vec![
            Value::bytes(b"ab".to_vec()),
            Value::bytes(Vec::new()),
            Value::bytes(b"abcde".to_vec())
        ]
    );
    let text = dataset
        .asstr(None, DecodeErrors::Strict)?
        .read(&Selection::all())?;
    assert_eq!(text, vec!["ab", "", "abcde"]);

    let err = dataset
        .write(&Selection::all(), ArrayValue::scalar("abcdef"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = dataset
        .write(&Selection::all(), ArrayValue::scalar("caf\u{e9}"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);

    // raw bytes are stored without a character set check
    dataset.write(
        &Selection::new(vec![SelectionItem::Index(1)]),
        ArrayValue::scalar(b"\xff".as_slice()),
    )?;
    let err = dataset
        .asstr(None, DecodeErrors::Strict)?
        .read(&Selection::all())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    let replaced = dataset
        .asstr(None, DecodeErrors::Replace)?
        .read(&Selection::new(vec![SelectionItem::Index(1)]))?;
    assert_eq!(replaced, vec!["\u{fffd}"]);
    let latin1 = dataset
        .asstr(Some(TextCodec::Latin1), DecodeErrors::Strict)?
        .read(&Selection::new(vec![SelectionItem::Index(1)]))?;
    assert_eq!(latin1, vec!["\u{ff}"]);
    Ok(())
}

#[test]
fn strings_vlen_utf8() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![2, 2])
        .data_type(DataType::vlen_string(Charset::Utf8))
        .build_and_store(Arc::new(MemoryStore::new()), "/text")?;
    let words = vec!["hello", "w\u{f6}rld", "\u{65e5}\u{672c}", ""];
    let data = ArrayValue::new(vec![2, 2], words.iter().map(|&w| Value::from(w)).collect())?;
    dataset.write(&Selection::all(), data)?;

    let view = dataset.asstr(None, DecodeErrors::Strict)?;
    assert_eq!(view.codec(), TextCodec::Utf8);
    assert_eq!(view.read(&Selection::all())?, words);
    assert_eq!(
        view.read(&Selection::new(vec![SelectionItem::full(), SelectionItem::Index(1)]))?,
        vec!["w\u{f6}rld", ""]
    );
    Ok(())
}

#[test]
fn strings_vlen_ascii_rejects_non_ascii() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![2])
        .data_type(DataType::vlen_string(Charset::Ascii))
        .build_and_store(Arc::new(MemoryStore::new()), "/ascii")?;
    let err = dataset
        .write(&Selection::all(), ArrayValue::from(vec!["ok", "\u{263a}"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    // nothing was written
    let text = dataset
        .asstr(None, DecodeErrors::Strict)?
        .read(&Selection::all())?;
    assert_eq!(text, vec!["", ""]);
    Ok(())
}

#[test]
fn strings_fixed_unicode_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![1])
        .data_type(DataType::vlen_string(Charset::Utf8))
        .build_and_store(Arc::new(MemoryStore::new()), "/unicode")?;
    let err = dataset
        .write(&Selection::all(), ArrayValue::fixed_unicode(4, ["abcd"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = DatasetBuilder::new()
        .data(ArrayValue::fixed_unicode(4, ["abcd"]))
        .build(Arc::new(MemoryStore::new()), "/inferred")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    Ok(())
}

#[test]
fn strings_non_string_views() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = DatasetBuilder::new()
        .shape(vec![1])
        .data_type(DataType::int32())
        .build_and_store(Arc::new(MemoryStore::new()), "/numbers")?;
    let err = dataset.asstr(None, DecodeErrors::Strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    let err = dataset
        .write(&Selection::all(), ArrayValue::scalar("1"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    Ok(())
}
