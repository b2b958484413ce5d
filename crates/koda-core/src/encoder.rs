//! Canonical binary encoder for `.kod` payloads.
//!
//! # Layout
//! ```text
//! Magic  : 4 bytes  "KODA"
//! Version: 1 byte   0x01
//! Dict   : [u32 N][ [u32 L][L UTF-8 bytes] x N ]
//! Data   : one encoded value
//! ```
//! All multi-byte integers are big-endian. The dictionary holds every object
//! key in the document, deduplicated and sorted by UTF-8 byte order; objects
//! reference keys by their index in that order. Two structurally equal
//! values always encode to identical bytes: object pairs are emitted in
//! ascending dictionary-index order and every NaN collapses to one quiet-NaN
//! bit pattern.

use std::collections::{BTreeSet, HashMap};

use crate::error::EncodeError;
use crate::value::Value;

pub(crate) const MAGIC: [u8; 4] = *b"KODA";
pub(crate) const VERSION: u8 = 1;

pub(crate) const TAG_NULL: u8 = 0x01;
pub(crate) const TAG_FALSE: u8 = 0x02;
pub(crate) const TAG_TRUE: u8 = 0x03;
pub(crate) const TAG_INT: u8 = 0x04;
pub(crate) const TAG_FLOAT: u8 = 0x05;
pub(crate) const TAG_STRING: u8 = 0x06;
/// Reserved for a future binary kind; never emitted, rejected on decode.
pub(crate) const TAG_BINARY_RESERVED: u8 = 0x07;
pub(crate) const TAG_ARRAY: u8 = 0x10;
pub(crate) const TAG_OBJECT: u8 = 0x11;

/// The single quiet-NaN bit pattern every NaN canonicalizes to.
pub(crate) const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

/// Limits applied while encoding.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Maximum nesting depth; a scalar counts as depth 1.
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions { max_depth: 256 }
    }
}

/// Encode a [`Value`] into its canonical `.kod` byte sequence.
pub fn encode(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    // &str ordering is UTF-8 byte order, so the BTreeSet iterates the
    // dictionary in exactly the canonical order
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    collect_keys(value, 1, options.max_depth, &mut keys)?;
    if keys.len() > u32::MAX as usize {
        return Err(EncodeError::DictionaryOverflow(keys.len()));
    }

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    write_u32(keys.len() as u32, &mut out);
    let mut index: HashMap<&str, u32> = HashMap::with_capacity(keys.len());
    for (i, &key) in keys.iter().enumerate() {
        write_u32(checked_len(key.len())?, &mut out);
        out.extend_from_slice(key.as_bytes());
        index.insert(key, i as u32);
    }

    write_value(value, &index, &mut out)?;
    Ok(out)
}

/// Pre-order traversal collecting every object key. Doubles as the depth
/// check, since it visits the whole tree before any byte is written.
fn collect_keys<'a>(
    value: &'a Value,
    depth: usize,
    max_depth: usize,
    keys: &mut BTreeSet<&'a str>,
) -> Result<(), EncodeError> {
    if depth > max_depth {
        return Err(EncodeError::DepthExceeded { max: max_depth });
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_keys(item, depth + 1, max_depth, keys)?;
            }
        }
        Value::Object(pairs) => {
            for (key, child) in pairs {
                keys.insert(key.as_str());
                collect_keys(child, depth + 1, max_depth, keys)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn write_value(
    value: &Value,
    index: &HashMap<&str, u32>,
    out: &mut Vec<u8>,
) -> Result<(), EncodeError> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_be_bytes());
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            let bits = if f.is_nan() {
                CANONICAL_NAN_BITS
            } else {
                f.to_bits()
            };
            out.extend_from_slice(&bits.to_be_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_u32(checked_len(s.len())?, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            write_u32(checked_len(items.len())?, out);
            for item in items {
                write_value(item, index, out)?;
            }
        }
        Value::Object(pairs) => {
            out.push(TAG_OBJECT);
            write_u32(checked_len(pairs.len())?, out);
            let mut ordered: Vec<(u32, &str, &Value)> = pairs
                .iter()
                .map(|(key, child)| (index[key.as_str()], key.as_str(), child))
                .collect();
            ordered.sort_unstable_by_key(|(id, _, _)| *id);
            for window in ordered.windows(2) {
                if window[0].0 == window[1].0 {
                    return Err(EncodeError::DuplicateKey(window[0].1.to_owned()));
                }
            }
            for (id, _, child) in ordered {
                write_u32(id, out);
                write_value(child, index, out)?;
            }
        }
    }
    Ok(())
}

fn write_u32(value: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn checked_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::LengthOverflow(len))
}
