//! Length-prefixed record framing over byte streams.
//!
//! Each record on the wire is `[LEB128 length][payload]`, where the payload
//! is exactly one encoded `.kod` document. The write side is a thin wrapper
//! over any [`Write`] sink; backpressure is the blocking write contract, a
//! value counts as accepted only once the sink has taken its bytes. The read
//! side is a push-style state machine that accepts arbitrary chunks: both
//! the length prefix and the payload may split across any number of chunks,
//! and the decoder runs exactly once per completed frame.
//!
//! Any error destroys the stream. Later calls report it closed, and error
//! offsets are relative to the start of the stream.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};

use tracing::{trace, warn};

use crate::decoder::{decode, DecodeOptions};
use crate::encoder::{encode, EncodeOptions};
use crate::error::{DecodeError, EncodeError};
use crate::value::Value;
use crate::varint::{encode_varint, VarintAccumulator, VarintStep};

/// Limits applied to the read side of a framed stream.
#[derive(Debug, Clone)]
pub struct FrameOptions {
    /// Maximum payload size of a single frame.
    pub max_frame_size: usize,
    /// Limits handed to the decoder for each payload.
    pub decode: DecodeOptions,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            max_frame_size: 1 << 20,
            decode: DecodeOptions::default(),
        }
    }
}

/// Write side: encodes values and frames them onto a sink in write order.
pub struct FrameEncoder<W: Write> {
    sink: W,
    options: EncodeOptions,
}

impl<W: Write> FrameEncoder<W> {
    pub fn new(sink: W) -> FrameEncoder<W> {
        FrameEncoder::with_options(sink, EncodeOptions::default())
    }

    pub fn with_options(sink: W, options: EncodeOptions) -> FrameEncoder<W> {
        FrameEncoder { sink, options }
    }

    /// Encode one value and write its frame. Returns once the sink has
    /// accepted every byte of the frame.
    pub fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        let payload = encode(value, &self.options)?;
        let mut prefix = Vec::with_capacity(10);
        encode_varint(payload.len() as u64, &mut prefix);
        self.sink.write_all(&prefix)?;
        self.sink.write_all(&payload)?;
        trace!(len = payload.len(), "wrote frame");
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.sink.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

enum FrameState {
    ReadLen(VarintAccumulator),
    ReadPayload { expected: usize, payload: Vec<u8> },
}

/// Read side: feed it byte chunks, collect decoded values.
pub struct FrameDecoder {
    state: FrameState,
    options: FrameOptions,
    /// Total bytes consumed from the stream so far.
    consumed: u64,
    /// Stream offset where the current frame's length prefix began.
    frame_start: u64,
    failed: bool,
}

impl FrameDecoder {
    pub fn new(options: FrameOptions) -> FrameDecoder {
        FrameDecoder {
            state: FrameState::ReadLen(VarintAccumulator::new()),
            options,
            consumed: 0,
            frame_start: 0,
            failed: false,
        }
    }

    /// Total bytes consumed from the stream so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Consume one chunk and return every value whose frame it completed.
    /// The first error poisons the stream; later calls report it closed.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Result<Vec<Value>, DecodeError> {
        if self.failed {
            return Err(DecodeError::StreamClosed);
        }
        let mut values = Vec::new();
        while !chunk.is_empty() {
            match &mut self.state {
                FrameState::ReadLen(acc) => {
                    let byte = chunk[0];
                    chunk = &chunk[1..];
                    let byte_offset = self.consumed;
                    self.consumed += 1;
                    match acc.push(byte) {
                        VarintStep::Incomplete => {}
                        VarintStep::TooLong | VarintStep::Overflow => {
                            return Err(self.fail(DecodeError::MalformedVarint {
                                offset: byte_offset,
                            }));
                        }
                        VarintStep::Complete(len) => {
                            if len > self.options.max_frame_size as u64 {
                                let err = DecodeError::FrameTooLarge {
                                    len,
                                    max: self.options.max_frame_size,
                                    offset: self.frame_start,
                                };
                                return Err(self.fail(err));
                            }
                            let expected = len as usize;
                            self.state = FrameState::ReadPayload {
                                expected,
                                payload: Vec::with_capacity(expected),
                            };
                            if expected == 0 {
                                values.push(self.complete_frame(Vec::new())?);
                            }
                        }
                    }
                }
                FrameState::ReadPayload { expected, payload } => {
                    let need = *expected - payload.len();
                    let take = need.min(chunk.len());
                    payload.extend_from_slice(&chunk[..take]);
                    chunk = &chunk[take..];
                    self.consumed += take as u64;
                    if payload.len() == *expected {
                        let done = std::mem::take(payload);
                        values.push(self.complete_frame(done)?);
                    }
                }
            }
        }
        Ok(values)
    }

    /// Signal end of input. Errors if a partial frame is still buffered.
    pub fn finish(&self) -> Result<(), DecodeError> {
        if self.failed {
            return Err(DecodeError::StreamClosed);
        }
        match &self.state {
            FrameState::ReadLen(acc) if acc.is_empty() => Ok(()),
            _ => Err(DecodeError::TruncatedStream {
                offset: self.consumed,
            }),
        }
    }

    /// Run the decoder on a completed payload and reset for the next frame.
    fn complete_frame(&mut self, payload: Vec<u8>) -> Result<Value, DecodeError> {
        self.state = FrameState::ReadLen(VarintAccumulator::new());
        let payload_start = self.consumed - payload.len() as u64;
        let value = decode(&payload, &self.options.decode)
            .map_err(|e| self.fail(e.at_stream_offset(payload_start)))?;
        trace!(len = payload.len(), "decoded frame");
        self.frame_start = self.consumed;
        Ok(value)
    }

    fn fail(&mut self, err: DecodeError) -> DecodeError {
        self.failed = true;
        warn!(error = %err, "decode stream failed");
        err
    }
}

/// Pull-based wrapper: iterate decoded values straight off any [`Read`]
/// source. Ends after the first error.
pub struct FrameReader<R: Read> {
    source: R,
    decoder: FrameDecoder,
    pending: VecDeque<Value>,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(source: R) -> FrameReader<R> {
        FrameReader::with_options(source, FrameOptions::default())
    }

    pub fn with_options(source: R, options: FrameOptions) -> FrameReader<R> {
        FrameReader {
            source,
            decoder: FrameDecoder::new(options),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Value, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Some(Ok(value));
            }
            if self.done {
                return None;
            }
            let mut buf = [0u8; 8192];
            let n = match self.source.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(DecodeError::Io(e)));
                }
            };
            if n == 0 {
                self.done = true;
                return match self.decoder.finish() {
                    Ok(()) => None,
                    Err(e) => Some(Err(e)),
                };
            }
            match self.decoder.feed(&buf[..n]) {
                Ok(values) => self.pending.extend(values),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
