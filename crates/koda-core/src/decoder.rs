//! Binary decoder for `.kod` payloads.
//!
//! Validation is strict and runs in layout order: header, dictionary, root
//! value, then a trailing-bytes check. Canonical form is enforced on input,
//! not just produced on output: an unsorted dictionary or out-of-order
//! object keys reject even though the data would be readable, so every
//! accepted document has exactly one byte representation.
//!
//! Resource bounds are checked before the corresponding allocation, and
//! container capacities are clamped to the bytes actually remaining so a
//! hostile count field cannot force a large reservation.

use crate::encoder::{
    MAGIC, TAG_ARRAY, TAG_BINARY_RESERVED, TAG_FALSE, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_OBJECT,
    TAG_STRING, TAG_TRUE, VERSION,
};
use crate::error::DecodeError;
use crate::value::Value;

/// Limits applied while decoding.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Maximum nesting depth; a scalar counts as depth 1.
    pub max_depth: usize,
    /// Maximum number of dictionary entries.
    pub max_dictionary_size: usize,
    /// Maximum byte length of any string, dictionary entries included.
    pub max_string_length: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_depth: 256,
            max_dictionary_size: 65_536,
            max_string_length: 1_000_000,
        }
    }
}

/// Decode one `.kod` byte sequence into a [`Value`]. The whole input must be
/// consumed; trailing bytes are an error.
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<Value, DecodeError> {
    if bytes.len() < 5 {
        return Err(DecodeError::UnexpectedEnd {
            offset: bytes.len() as u64,
        });
    }
    if bytes[..4] != MAGIC {
        return Err(DecodeError::BadMagic { offset: 0 });
    }
    if bytes[4] != VERSION {
        return Err(DecodeError::UnsupportedVersion {
            version: bytes[4],
            offset: 4,
        });
    }

    let mut reader = Reader { buf: bytes, pos: 5 };
    let dictionary = read_dictionary(&mut reader, options)?;
    let root = read_value(&mut reader, &dictionary, 1, options)?;
    if reader.pos != bytes.len() {
        return Err(DecodeError::TrailingBytes {
            remaining: (bytes.len() - reader.pos) as u64,
            offset: reader.pos as u64,
        });
    }
    Ok(root)
}

fn read_dictionary(
    reader: &mut Reader<'_>,
    options: &DecodeOptions,
) -> Result<Vec<String>, DecodeError> {
    let count_offset = reader.pos;
    let count = reader.read_u32()?;
    if count as usize > options.max_dictionary_size {
        return Err(DecodeError::DictionaryTooLarge {
            count,
            max: options.max_dictionary_size,
            offset: count_offset as u64,
        });
    }
    let mut dictionary: Vec<String> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let entry_offset = reader.pos;
        let len = reader.read_u32()?;
        if len as usize > options.max_string_length {
            return Err(DecodeError::StringTooLong {
                len,
                max: options.max_string_length,
                offset: entry_offset as u64,
            });
        }
        let entry = reader.read_str(len as usize)?;
        // strictly ascending also rules out duplicate keys
        if let Some(prev) = dictionary.last() {
            if entry.as_bytes() <= prev.as_bytes() {
                return Err(DecodeError::DictionaryNotSorted {
                    index: i,
                    offset: entry_offset as u64,
                });
            }
        }
        dictionary.push(entry.to_owned());
    }
    Ok(dictionary)
}

fn read_value(
    reader: &mut Reader<'_>,
    dictionary: &[String],
    depth: usize,
    options: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let tag_offset = reader.pos;
    if depth > options.max_depth {
        return Err(DecodeError::DepthExceeded {
            max: options.max_depth,
            offset: tag_offset as u64,
        });
    }
    let tag = reader.read_u8()?;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_FALSE => Ok(Value::Bool(false)),
        TAG_TRUE => Ok(Value::Bool(true)),
        TAG_INT => Ok(Value::Int(i64::from_be_bytes(reader.read_array()?))),
        // NaN payloads decode as-is; canonicalization happens on encode
        TAG_FLOAT => Ok(Value::Float(f64::from_bits(u64::from_be_bytes(
            reader.read_array()?,
        )))),
        TAG_STRING => {
            let len_offset = reader.pos;
            let len = reader.read_u32()?;
            if len as usize > options.max_string_length {
                return Err(DecodeError::StringTooLong {
                    len,
                    max: options.max_string_length,
                    offset: len_offset as u64,
                });
            }
            let s = reader.read_str(len as usize)?;
            Ok(Value::String(s.to_owned()))
        }
        TAG_ARRAY => {
            let count = reader.read_u32()? as usize;
            // every element takes at least one byte
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(read_value(reader, dictionary, depth + 1, options)?);
            }
            Ok(Value::Array(items))
        }
        TAG_OBJECT => {
            let count = reader.read_u32()? as usize;
            // every pair takes at least five bytes (index + tag)
            let mut pairs = Vec::with_capacity(count.min(reader.remaining() / 5));
            let mut prev_index: Option<u32> = None;
            for _ in 0..count {
                let index_offset = reader.pos;
                let index = reader.read_u32()?;
                if index as usize >= dictionary.len() {
                    return Err(DecodeError::KeyIndexOutOfRange {
                        index,
                        len: dictionary.len() as u32,
                        offset: index_offset as u64,
                    });
                }
                if let Some(prev) = prev_index {
                    if index == prev {
                        return Err(DecodeError::DuplicateKeyIndex {
                            index,
                            offset: index_offset as u64,
                        });
                    }
                    if index < prev {
                        return Err(DecodeError::KeyOrderViolation {
                            offset: index_offset as u64,
                        });
                    }
                }
                prev_index = Some(index);
                let child = read_value(reader, dictionary, depth + 1, options)?;
                pairs.push((dictionary[index as usize].clone(), child));
            }
            Ok(Value::Object(pairs))
        }
        TAG_BINARY_RESERVED => Err(DecodeError::ReservedTag {
            offset: tag_offset as u64,
        }),
        other => Err(DecodeError::UnknownTag {
            tag: other,
            offset: tag_offset as u64,
        }),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        match self.buf.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(DecodeError::UnexpectedEnd {
                offset: self.buf.len() as u64,
            }),
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEnd {
                offset: self.buf.len() as u64,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read `len` bytes and validate them as UTF-8, reporting the offset of
    /// the first invalid byte on failure.
    fn read_str(&mut self, len: usize) -> Result<&'a str, DecodeError> {
        let start = self.pos;
        let raw = self.read_bytes(len)?;
        std::str::from_utf8(raw).map_err(|e| DecodeError::InvalidUtf8 {
            offset: (start + e.valid_up_to()) as u64,
        })
    }
}
