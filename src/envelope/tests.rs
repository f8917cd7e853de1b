//! Unit and generated tests for the envelope header and codec.

use bytes::{BufMut, Bytes, BytesMut};
use proptest::{
    collection::vec,
    prelude::{Just, Strategy, any, prop_oneof},
    prop_assert_eq,
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestCaseError, TestRng, TestRunner},
};
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::*;

fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn message_type_strategy() -> impl Strategy<Value = MessageType> {
    prop_oneof![Just(MessageType::Request), Just(MessageType::Response)]
}

fn payload_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(0usize),
        Just(1usize),
        Just(max - 1),
        Just(max),
        0usize..=max,
    ]
    .prop_flat_map(|len| vec(any::<u8>(), len))
}

fn frame_strategy(max: usize) -> impl Strategy<Value = Frame> {
    (
        message_type_strategy(),
        any::<[u8; 16]>(),
        payload_strategy(max),
    )
        .prop_map(|(kind, id, payload)| Frame::new(kind, CorrelationId::from_bytes(id), payload))
}

fn encode_all(frames: &[Frame]) -> BytesMut {
    let mut wire = BytesMut::new();
    for frame in frames {
        EnvelopeCodec
            .encode(frame.clone(), &mut wire)
            .expect("frame should encode");
    }
    wire
}

#[test]
fn header_layout_matches_wire_table() {
    let id = CorrelationId::from_bytes([0xAB; 16]);
    let header = encode_header(MessageType::Request, id, 0x0102).expect("header should encode");

    assert_eq!(header.len(), HEADER_SIZE);
    assert_eq!(header[0], PROTOCOL_VERSION);
    assert_eq!(&header[1..17], &[0xAB; 16]);
    assert_eq!(&header[17..19], &[0x02, 0x01]);
    assert_eq!(header[19], MessageType::Request.tag());
    assert_eq!(&header[20..], &[0u8; 12]);
}

#[test]
fn reserved_bytes_are_ignored_on_read() {
    let id = CorrelationId::from_bytes([7; 16]);
    let mut header = encode_header(MessageType::Response, id, 3).expect("header should encode");
    header[20..].fill(0xEE);

    let decoded = decode_header(&header).expect("reserved bytes should not matter");
    assert_eq!(decoded.id, id);
    assert_eq!(decoded.payload_len, 3);
    assert_eq!(decoded.message_type, MessageType::Response);
}

#[rstest]
#[case(0)]
#[case(2)]
#[case(0xFF)]
fn unsupported_version_is_rejected(#[case] version: u8) {
    let mut header =
        encode_header(MessageType::Request, CorrelationId::from_bytes([1; 16]), 0)
            .expect("header should encode");
    header[0] = version;

    assert_eq!(
        decode_header(&header),
        Err(ProtocolViolation::UnsupportedVersion(version))
    );
}

#[test]
fn unknown_message_type_is_rejected() {
    let mut header =
        encode_header(MessageType::Request, CorrelationId::from_bytes([1; 16]), 0)
            .expect("header should encode");
    header[19] = 9;

    assert_eq!(
        decode_header(&header),
        Err(ProtocolViolation::UnknownMessageType(9))
    );
}

#[rstest]
#[case(0x8000)]
#[case(0xFFFF)]
fn lengths_with_the_sign_bit_set_are_rejected(#[case] len: u16) {
    let mut header =
        encode_header(MessageType::Request, CorrelationId::from_bytes([1; 16]), 0)
            .expect("header should encode");
    header[17..19].copy_from_slice(&len.to_le_bytes());

    assert_eq!(
        decode_header(&header),
        Err(ProtocolViolation::LengthOutOfRange {
            len: usize::from(len),
            max: MAX_PAYLOAD_LEN,
        })
    );
}

#[test]
fn truncated_header_is_reported() {
    assert_eq!(
        decode_header(&[PROTOCOL_VERSION; 10]),
        Err(ProtocolViolation::TruncatedHeader(10))
    );
}

#[rstest]
#[case(MAX_PAYLOAD_LEN, true)]
#[case(MAX_PAYLOAD_LEN + 1, false)]
#[case(usize::from(u16::MAX), false)]
#[case(usize::from(u16::MAX) + 1, false)]
fn encode_enforces_payload_limit(#[case] len: usize, #[case] ok: bool) {
    let result = encode_header(MessageType::Request, CorrelationId::from_bytes([0; 16]), len);
    match (ok, result) {
        (true, Ok(header)) => assert_eq!(decode_header(&header).map(|h| h.payload_len), Ok(len)),
        (false, Err(MuxError::SizeExceeded { size, max })) => {
            assert_eq!(size, len);
            assert_eq!(max, MAX_PAYLOAD_LEN);
        }
        (_, other) => panic!("unexpected result for {len}: {other:?}"),
    }
}

#[test]
fn decoder_waits_for_complete_header_and_payload() {
    let frame = Frame::new(
        MessageType::Request,
        CorrelationId::from_bytes([3; 16]),
        Bytes::from_static(b"hello"),
    );
    let wire = encode_all(std::slice::from_ref(&frame));

    let mut codec = EnvelopeCodec::new();
    let mut partial = BytesMut::from(&wire[..HEADER_SIZE - 1]);
    assert!(codec.decode(&mut partial).expect("partial header").is_none());

    partial.put_slice(&wire[HEADER_SIZE - 1..HEADER_SIZE + 2]);
    assert!(codec.decode(&mut partial).expect("partial payload").is_none());
    assert_eq!(partial.len(), HEADER_SIZE + 2, "nothing consumed yet");

    partial.put_slice(&wire[HEADER_SIZE + 2..]);
    let decoded = codec
        .decode(&mut partial)
        .expect("complete frame")
        .expect("frame present");
    assert_eq!(decoded, frame);
    assert!(partial.is_empty());
}

#[test]
fn decoder_leaves_following_frame_buffered() {
    let first = Frame::new(
        MessageType::Request,
        CorrelationId::from_bytes([1; 16]),
        Bytes::from_static(b"one"),
    );
    let second = Frame::new(
        MessageType::Response,
        CorrelationId::from_bytes([2; 16]),
        Bytes::from_static(b"two"),
    );
    let mut wire = encode_all(&[first.clone(), second.clone()]);
    wire.truncate(wire.len() - 1);

    let mut codec = EnvelopeCodec::new();
    assert_eq!(codec.decode(&mut wire).expect("first"), Some(first));
    assert!(codec.decode(&mut wire).expect("second partial").is_none());
    assert_eq!(wire.len(), second.wire_size() - 1);
}

#[test]
fn generated_frames_round_trip() {
    let mut runner = deterministic_runner(64);
    runner
        .run(&vec(frame_strategy(MAX_PAYLOAD_LEN), 1..4), |frames| {
            let mut wire = encode_all(&frames);
            let mut codec = EnvelopeCodec::new();
            for expected in &frames {
                let decoded = codec
                    .decode(&mut wire)
                    .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?
                    .ok_or_else(|| TestCaseError::fail("missing frame".to_owned()))?;
                prop_assert_eq!(&decoded, expected);
            }
            prop_assert_eq!(wire.len(), 0);
            Ok(())
        })
        .expect("generated frames should round-trip");
}

#[test]
fn generated_chunk_boundaries_reassemble_identically() {
    let mut runner = deterministic_runner(128);
    let strategy = vec(frame_strategy(64), 1..8)
        .prop_flat_map(|frames| (Just(frames), vec(1usize..48, 1..32)));

    runner
        .run(&strategy, |(frames, chunk_sizes)| {
            let wire = encode_all(&frames).freeze();
            let mut codec = EnvelopeCodec::new();
            let mut buffer = BytesMut::new();
            let mut decoded = Vec::new();
            let mut offset = 0;
            let mut sizes = chunk_sizes.iter().cycle();

            while offset < wire.len() {
                let size = (*sizes.next().unwrap_or(&1)).min(wire.len() - offset);
                buffer.put_slice(&wire[offset..offset + size]);
                offset += size;
                while let Some(frame) = codec
                    .decode(&mut buffer)
                    .map_err(|err| TestCaseError::fail(format!("decode failed: {err}")))?
                {
                    decoded.push(frame);
                }
            }

            prop_assert_eq!(decoded, frames);
            prop_assert_eq!(buffer.len(), 0);
            Ok(())
        })
        .expect("chunked frames should reassemble");
}
