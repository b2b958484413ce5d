//! File helper tests, running against real temp directories.

use koda_core::{
    load_file, save_file, FileError, LoadOptions, SaveFormat, SaveOptions, StringifyOptions,
    Value,
};

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    Value::Object(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

fn sample() -> Value {
    obj(vec![
        ("name", Value::from("archive")),
        ("entries", Value::Array(vec![Value::Int(1), Value::Int(2)])),
    ])
}

#[test]
fn binary_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.kod");
    save_file(&path, &sample(), &SaveOptions::default()).unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..4], b"KODA");

    let back = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(back, sample());
}

#[test]
fn text_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.koda");
    let options = SaveOptions {
        format: SaveFormat::Text,
        stringify: StringifyOptions::pretty(2),
        ..SaveOptions::default()
    };
    save_file(&path, &sample(), &options).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with('{'));

    let back = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(back, sample());
}

#[test]
fn unknown_extension_sniffs_the_magic() {
    let dir = tempfile::tempdir().unwrap();

    let binary_path = dir.path().join("payload.bin");
    save_file(&binary_path, &sample(), &SaveOptions::default()).unwrap();
    assert_eq!(load_file(&binary_path, &LoadOptions::default()).unwrap(), sample());

    let text_path = dir.path().join("notes.txt");
    std::fs::write(&text_path, "KODAK: yes").unwrap();
    let back = load_file(&text_path, &LoadOptions::default()).unwrap();
    assert_eq!(back.get("KODAK"), Some(&Value::from("yes")));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_file("/nonexistent/koda/file.kod", &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, FileError::Io(_)));
}

#[test]
fn invalid_utf8_text_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.koda");
    std::fs::write(&path, b"a: 1\nb: \xFF\xFE").unwrap();
    let err = load_file(&path, &LoadOptions::default()).unwrap_err();
    match err {
        FileError::Parse(e) => assert_eq!(e.line, 2),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn corrupt_binary_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.kod");
    std::fs::write(&path, b"KODA\x01\x00\x00").unwrap();
    let err = load_file(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, FileError::Decode(_)));
}
