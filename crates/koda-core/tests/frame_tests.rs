//! Frame codec tests: incremental reassembly, framing errors, stream
//! poisoning, and the reader/writer adapters.

use std::io::Cursor;

use koda_core::{
    encode, DecodeError, DecodeOptions, EncodeOptions, FrameDecoder, FrameEncoder, FrameOptions,
    FrameReader, Value,
};

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    Value::Object(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
}

fn frame_bytes(values: &[Value]) -> Vec<u8> {
    let mut encoder = FrameEncoder::new(Vec::new());
    for value in values {
        encoder.write_value(value).unwrap();
    }
    encoder.into_inner()
}

// ============================================================================
// Write side
// ============================================================================

#[test]
fn frames_are_length_prefixed_payloads() {
    let value = Value::Object(vec![]);
    let wire = frame_bytes(std::slice::from_ref(&value));
    let payload = encode(&value, &EncodeOptions::default()).unwrap();
    // 14-byte payload fits a single varint byte
    assert_eq!(wire[0], payload.len() as u8);
    assert_eq!(&wire[1..], &payload[..]);
}

#[test]
fn write_order_is_preserved_on_the_wire() {
    let values = vec![
        obj(vec![("seq", Value::Int(1))]),
        obj(vec![("seq", Value::Int(2))]),
        obj(vec![("seq", Value::Int(3))]),
    ];
    let wire = frame_bytes(&values);
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    let decoded = decoder.feed(&wire).unwrap();
    decoder.finish().unwrap();
    assert_eq!(decoded, values);
}

// ============================================================================
// Read side: reassembly
// ============================================================================

#[test]
fn chunks_may_split_anywhere() {
    let values = vec![
        obj(vec![("a", Value::from("first"))]),
        obj(vec![("b", Value::from("second"))]),
    ];
    let wire = frame_bytes(&values);

    // every split point of the wire into two chunks
    for split in 0..=wire.len() {
        let mut decoder = FrameDecoder::new(FrameOptions::default());
        let mut out = decoder.feed(&wire[..split]).unwrap();
        out.extend(decoder.feed(&wire[split..]).unwrap());
        decoder.finish().unwrap();
        assert_eq!(out, values, "split at {split}");
    }
}

#[test]
fn an_empty_chunk_is_a_no_op() {
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    assert!(decoder.feed(&[]).unwrap().is_empty());
    decoder.finish().unwrap();
}

#[test]
fn multi_byte_length_prefix_split_across_chunks() {
    // a payload long enough to need a two-byte varint
    let value = obj(vec![(
        "data",
        Value::from("x".repeat(200).as_str()),
    )]);
    let wire = frame_bytes(std::slice::from_ref(&value));
    assert!(wire[0] & 0x80 != 0, "expected a multi-byte varint");

    let mut decoder = FrameDecoder::new(FrameOptions::default());
    assert!(decoder.feed(&wire[..1]).unwrap().is_empty());
    let out = decoder.feed(&wire[1..]).unwrap();
    assert_eq!(out, vec![value]);
}

#[test]
fn bytes_consumed_tracks_the_stream() {
    let wire = frame_bytes(&[Value::Object(vec![])]);
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    decoder.feed(&wire).unwrap();
    assert_eq!(decoder.bytes_consumed(), wire.len() as u64);
}

// ============================================================================
// Read side: errors
// ============================================================================

#[test]
fn varint_without_terminator_is_malformed() {
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    let err = decoder.feed(&[0x80; 11]).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedVarint { offset: 10 }));
}

#[test]
fn varint_overflowing_u64_is_malformed() {
    let mut bytes = vec![0xFF; 9];
    bytes.push(0x02); // would set bit 64
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    let err = decoder.feed(&bytes).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedVarint { offset: 9 }));
}

#[test]
fn oversized_frame_is_rejected_before_buffering() {
    let options = FrameOptions {
        max_frame_size: 16,
        decode: DecodeOptions::default(),
    };
    let mut decoder = FrameDecoder::new(options);
    let err = decoder.feed(&[17]).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::FrameTooLarge { len: 17, max: 16, offset: 0 }
    ));
}

#[test]
fn payload_errors_carry_stream_relative_offsets() {
    // one good frame, then a frame whose payload is garbage
    let good = frame_bytes(&[Value::Object(vec![])]);
    let mut wire = good.clone();
    wire.extend_from_slice(&[3, b'X', b'Y', b'Z']);

    let mut decoder = FrameDecoder::new(FrameOptions::default());
    let err = decoder.feed(&wire).unwrap_err();
    // the bad payload is 3 bytes, so validation stops at its end:
    // good frame (15 bytes) + prefix (1) + payload length (3)
    assert_eq!(err.offset(), Some(good.len() as u64 + 1 + 3));
}

#[test]
fn end_of_input_inside_a_frame_is_truncated_stream() {
    let wire = frame_bytes(&[Value::Object(vec![])]);
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    decoder.feed(&wire[..wire.len() - 2]).unwrap();
    let err = decoder.finish().unwrap_err();
    assert!(matches!(err, DecodeError::TruncatedStream { .. }));

    // a partial varint alone is also a truncated stream
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    decoder.feed(&[0x80]).unwrap();
    assert!(matches!(
        decoder.finish().unwrap_err(),
        DecodeError::TruncatedStream { offset: 1 }
    ));
}

#[test]
fn errors_poison_the_stream() {
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    decoder.feed(&[0x80; 11]).unwrap_err();
    let err = decoder.feed(&[0x00]).unwrap_err();
    assert!(matches!(err, DecodeError::StreamClosed));
    assert!(matches!(
        decoder.finish().unwrap_err(),
        DecodeError::StreamClosed
    ));
}

#[test]
fn values_before_the_error_were_already_delivered() {
    let good = frame_bytes(&[obj(vec![("n", Value::Int(1))])]);
    let mut decoder = FrameDecoder::new(FrameOptions::default());
    let delivered = decoder.feed(&good).unwrap();
    assert_eq!(delivered.len(), 1);
    decoder.feed(&[0x80; 11]).unwrap_err();
}

// ============================================================================
// FrameReader
// ============================================================================

#[test]
fn reader_iterates_values_off_any_read_source() {
    let values = vec![
        obj(vec![("id", Value::Int(1))]),
        obj(vec![("id", Value::Int(2))]),
        Value::Array(vec![Value::Null]),
    ];
    let wire = frame_bytes(&values);
    let reader = FrameReader::new(Cursor::new(wire));
    let decoded: Result<Vec<Value>, _> = reader.collect();
    assert_eq!(decoded.unwrap(), values);
}

#[test]
fn reader_surfaces_truncation_as_final_item() {
    let wire = frame_bytes(&[Value::Object(vec![])]);
    let truncated = &wire[..wire.len() - 1];
    let mut reader = FrameReader::new(Cursor::new(truncated.to_vec()));
    let item = reader.next().unwrap();
    assert!(matches!(item, Err(DecodeError::TruncatedStream { .. })));
    assert!(reader.next().is_none());
}

#[test]
fn reader_stops_after_a_frame_error() {
    let mut wire = frame_bytes(&[obj(vec![("ok", Value::Bool(true))])]);
    wire.extend_from_slice(&[0x80; 11]);
    let mut reader = FrameReader::new(Cursor::new(wire));
    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(
        reader.next().unwrap(),
        Err(DecodeError::MalformedVarint { .. })
    ));
    assert!(reader.next().is_none());
}
