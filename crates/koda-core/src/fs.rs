//! File helpers for the two on-disk formats.
//!
//! `.kod` files hold the canonical binary encoding, `.koda` files hold UTF-8
//! text. [`load_file`] picks the format by extension when it recognizes one,
//! and otherwise by sniffing the binary magic and version, which cannot occur
//! at the start of valid text.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::decoder::{decode, DecodeOptions};
use crate::encoder::{encode, EncodeOptions, MAGIC, VERSION};
use crate::error::{FileError, ParseError, ParseErrorKind};
use crate::parser::{parse, ParseOptions};
use crate::serializer::{stringify, StringifyOptions};
use crate::value::Value;

/// Limits for [`load_file`], covering both formats.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub parse: ParseOptions,
    pub decode: DecodeOptions,
}

/// On-disk format for [`save_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Text,
    Binary,
}

/// Output selection for [`save_file`]. Binary is the default; it is the
/// canonical archival form.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub format: SaveFormat,
    pub stringify: StringifyOptions,
    pub encode: EncodeOptions,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            format: SaveFormat::Binary,
            stringify: StringifyOptions::default(),
            encode: EncodeOptions::default(),
        }
    }
}

/// Read a value from a `.kod` or `.koda` file.
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Value, FileError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let value = if is_binary(path, &bytes) {
        decode(&bytes, &options.decode)?
    } else {
        parse(text_from_bytes(&bytes)?, &options.parse)?
    };
    debug!(path = %path.display(), "loaded file");
    Ok(value)
}

/// Write a value to a file in the selected format.
pub fn save_file(
    path: impl AsRef<Path>,
    value: &Value,
    options: &SaveOptions,
) -> Result<(), FileError> {
    let path = path.as_ref();
    match options.format {
        SaveFormat::Binary => fs::write(path, encode(value, &options.encode)?)?,
        SaveFormat::Text => fs::write(path, stringify(value, &options.stringify)?)?,
    }
    debug!(path = %path.display(), "saved file");
    Ok(())
}

fn is_binary(path: &Path, bytes: &[u8]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("kod") => true,
        Some("koda") => false,
        _ => bytes.len() >= 5 && bytes[..4] == MAGIC && bytes[4] == VERSION,
    }
}

/// Validate file bytes as UTF-8, reporting the position of the first bad
/// byte in the same shape as any other parse error.
fn text_from_bytes(bytes: &[u8]) -> Result<&str, FileError> {
    std::str::from_utf8(bytes).map_err(|e| {
        let prefix = match std::str::from_utf8(&bytes[..e.valid_up_to()]) {
            Ok(p) => p,
            Err(_) => "",
        };
        let line = 1 + prefix.matches('\n').count();
        let column = 1 + prefix
            .rsplit('\n')
            .next()
            .map(|tail| tail.chars().count())
            .unwrap_or(0);
        FileError::Parse(ParseError {
            kind: ParseErrorKind::InvalidUtf8,
            line,
            column,
            offset: e.valid_up_to(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_error_position_counts_lines() {
        let bytes = b"ok: 1\nbad: \xFF";
        let err = text_from_bytes(bytes).unwrap_err();
        match err {
            FileError::Parse(e) => {
                assert_eq!(e.kind, ParseErrorKind::InvalidUtf8);
                assert_eq!(e.line, 2);
                assert_eq!(e.column, 6);
                assert_eq!(e.offset, 11);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn sniffing_prefers_extension() {
        assert!(is_binary(Path::new("data.kod"), b""));
        assert!(!is_binary(Path::new("data.koda"), b"KODA\x01"));
        assert!(is_binary(Path::new("data.bin"), b"KODA\x01\x00"));
        assert!(!is_binary(Path::new("data.txt"), b"KODAK: yes"));
    }
}
