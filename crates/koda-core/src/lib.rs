//! # koda-core
//!
//! Encoder, decoder, and text codec for **KODA (Compact Object Data
//! Architecture)**, a structured data format with two faces: a
//! human-authorable text syntax (`.koda`) and a canonical, deterministic
//! binary encoding (`.kod`). It competes with JSON on size and with
//! MessagePack on determinism: object keys are deduplicated into a sorted
//! dictionary, so structurally equal documents always produce identical
//! bytes.
//!
//! ## Quick start
//!
//! ```rust
//! use koda_core::{decode, encode, parse, DecodeOptions, EncodeOptions, ParseOptions};
//!
//! // config-style text, comments and unquoted strings included
//! let value = parse("// service manifest\nname: my-app, version: 1", &ParseOptions::default()).unwrap();
//!
//! let bytes = encode(&value, &EncodeOptions::default()).unwrap();
//! let back = decode(&bytes, &DecodeOptions::default()).unwrap();
//! assert_eq!(value, back);
//! ```
//!
//! ## Modules
//!
//! - [`value`] - the seven-variant [`Value`] tree
//! - [`parser`] - `.koda` text to [`Value`], with line/column errors
//! - [`serializer`] - [`Value`] to `.koda` text, compact or pretty
//! - [`encoder`] - [`Value`] to canonical `.kod` bytes
//! - [`decoder`] - `.kod` bytes to [`Value`], under resource bounds
//! - [`frame`] - LEB128 length-prefixed record streaming
//! - [`pool`] - off-thread decode workers
//! - [`fs`] - file helpers for both formats
//! - [`error`] - the parse / encode / decode error taxonomy

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod fs;
pub mod parser;
pub mod pool;
pub mod serializer;
pub mod value;

mod varint;

pub use decoder::{decode, DecodeOptions};
pub use encoder::{encode, EncodeOptions};
pub use error::{DecodeError, EncodeError, FileError, ParseError, ParseErrorKind};
pub use frame::{FrameDecoder, FrameEncoder, FrameOptions, FrameReader};
pub use fs::{load_file, save_file, LoadOptions, SaveFormat, SaveOptions};
pub use parser::{parse, ParseOptions};
pub use pool::{spawn_decode, DecodeJob, DecoderPool, PoolOptions};
pub use serializer::{stringify, Newline, StringifyOptions};
pub use value::Value;
