//! Error types for KODA text parsing, encoding, and decoding.
//!
//! Three kinds, matching the three boundaries of the engine: [`ParseError`]
//! for the text face (line/column positions), [`EncodeError`] for value-side
//! failures, and [`DecodeError`] for binary and stream-framing failures (byte
//! offsets). All errors are fail-fast: the first violation aborts the
//! operation with no partial result.

use thiserror::Error;

/// Failure while parsing `.koda` text, positioned at the first offending
/// byte. `line` and `column` are 1-based; `column` counts characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at line {line}:{column}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub line: usize,
    pub column: usize,
    /// Byte offset into the input.
    pub offset: usize,
}

/// The rule a [`ParseError`] violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("unterminated string")]
    UnterminatedString,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),

    #[error("invalid unicode escape")]
    InvalidUnicodeEscape,

    #[error("invalid UTF-16 surrogate pair")]
    InvalidSurrogatePair,

    #[error("unescaped control character in string")]
    ControlCharacter,

    #[error("invalid number")]
    InvalidNumber,

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected content after document end")]
    TrailingCharacters,

    #[error("nesting depth exceeds {0}")]
    DepthExceeded(usize),

    #[error("input length {len} exceeds limit {max}")]
    InputTooLarge { len: usize, max: usize },

    #[error("invalid UTF-8 in input")]
    InvalidUtf8,
}

/// Failure while producing text or canonical bytes from a [`crate::Value`].
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("nesting depth exceeds {max}")]
    DepthExceeded { max: usize },

    #[error("duplicate key '{0}' in object")]
    DuplicateKey(String),

    #[error("dictionary size {0} exceeds u32 range")]
    DictionaryOverflow(usize),

    #[error("length {0} exceeds u32 range")]
    LengthOverflow(usize),

    #[error("cannot serialize non-finite float {0}")]
    NonFiniteFloat(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while decoding `.kod` bytes or reassembling a framed stream.
/// Offsets are relative to the input buffer, or to the start of the stream
/// for frame-level failures and errors inside framed payloads.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEnd { offset: u64 },

    #[error("bad magic at byte {offset}, expected \"KODA\"")]
    BadMagic { offset: u64 },

    #[error("unsupported format version {version} at byte {offset}")]
    UnsupportedVersion { version: u8, offset: u64 },

    #[error("dictionary size {count} exceeds limit {max} (byte {offset})")]
    DictionaryTooLarge { count: u32, max: usize, offset: u64 },

    #[error("string length {len} exceeds limit {max} (byte {offset})")]
    StringTooLong { len: u32, max: usize, offset: u64 },

    #[error("dictionary not in canonical order at index {index} (byte {offset})")]
    DictionaryNotSorted { index: u32, offset: u64 },

    #[error("invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("unknown type tag {tag:#04x} at byte {offset}")]
    UnknownTag { tag: u8, offset: u64 },

    #[error("reserved type tag 0x07 at byte {offset}")]
    ReservedTag { offset: u64 },

    #[error("key index {index} out of range for dictionary of {len} (byte {offset})")]
    KeyIndexOutOfRange { index: u32, len: u32, offset: u64 },

    #[error("duplicate key index {index} in object (byte {offset})")]
    DuplicateKeyIndex { index: u32, offset: u64 },

    #[error("object keys not in ascending dictionary order (byte {offset})")]
    KeyOrderViolation { offset: u64 },

    #[error("nesting depth exceeds {max} (byte {offset})")]
    DepthExceeded { max: usize, offset: u64 },

    #[error("{remaining} trailing bytes after document end (byte {offset})")]
    TrailingBytes { remaining: u64, offset: u64 },

    #[error("malformed varint at byte {offset}")]
    MalformedVarint { offset: u64 },

    #[error("frame length {len} exceeds limit {max} (byte {offset})")]
    FrameTooLarge { len: u64, max: usize, offset: u64 },

    #[error("truncated stream: input ended inside a frame (byte {offset})")]
    TruncatedStream { offset: u64 },

    #[error("stream is closed after an earlier error")]
    StreamClosed,

    #[error("decoder pool is shut down")]
    PoolClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Byte offset the error points at, when it carries one.
    pub fn offset(&self) -> Option<u64> {
        use DecodeError::*;
        match self {
            UnexpectedEnd { offset }
            | BadMagic { offset }
            | UnsupportedVersion { offset, .. }
            | DictionaryTooLarge { offset, .. }
            | StringTooLong { offset, .. }
            | DictionaryNotSorted { offset, .. }
            | InvalidUtf8 { offset }
            | UnknownTag { offset, .. }
            | ReservedTag { offset }
            | KeyIndexOutOfRange { offset, .. }
            | DuplicateKeyIndex { offset, .. }
            | KeyOrderViolation { offset }
            | DepthExceeded { offset, .. }
            | TrailingBytes { offset, .. }
            | MalformedVarint { offset }
            | FrameTooLarge { offset, .. }
            | TruncatedStream { offset } => Some(*offset),
            StreamClosed | PoolClosed | Io(_) => None,
        }
    }

    /// Shift the error's offset by `base`, turning a payload-relative
    /// position into a stream-relative one.
    pub(crate) fn at_stream_offset(self, base: u64) -> DecodeError {
        use DecodeError::*;
        match self {
            UnexpectedEnd { offset } => UnexpectedEnd { offset: base + offset },
            BadMagic { offset } => BadMagic { offset: base + offset },
            UnsupportedVersion { version, offset } => UnsupportedVersion {
                version,
                offset: base + offset,
            },
            DictionaryTooLarge { count, max, offset } => DictionaryTooLarge {
                count,
                max,
                offset: base + offset,
            },
            StringTooLong { len, max, offset } => StringTooLong {
                len,
                max,
                offset: base + offset,
            },
            DictionaryNotSorted { index, offset } => DictionaryNotSorted {
                index,
                offset: base + offset,
            },
            InvalidUtf8 { offset } => InvalidUtf8 { offset: base + offset },
            UnknownTag { tag, offset } => UnknownTag {
                tag,
                offset: base + offset,
            },
            ReservedTag { offset } => ReservedTag { offset: base + offset },
            KeyIndexOutOfRange { index, len, offset } => KeyIndexOutOfRange {
                index,
                len,
                offset: base + offset,
            },
            DuplicateKeyIndex { index, offset } => DuplicateKeyIndex {
                index,
                offset: base + offset,
            },
            KeyOrderViolation { offset } => KeyOrderViolation { offset: base + offset },
            DepthExceeded { max, offset } => DepthExceeded {
                max,
                offset: base + offset,
            },
            TrailingBytes { remaining, offset } => TrailingBytes {
                remaining,
                offset: base + offset,
            },
            MalformedVarint { offset } => MalformedVarint { offset: base + offset },
            FrameTooLarge { len, max, offset } => FrameTooLarge {
                len,
                max,
                offset: base + offset,
            },
            TruncatedStream { offset } => TruncatedStream { offset: base + offset },
            other => other,
        }
    }
}

/// Failure from the file helpers, aggregating the I/O boundary with the
/// format errors behind it.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
