use std::sync::Arc;

use proptest::prelude::*;
use telelink_frame::{
    decode_message, pack, pack_into_wire_bytes, ChannelMux, Frame, ParseOutcome, ParserState,
    COMM_0, COMM_1, MAX_FRAME_SIZE, START_MARKER,
};
use telelink_schema::catalog::STATUSTEXT;
use telelink_schema::{
    decode_field, encode_field, CharArray, FieldDescriptor, FieldType, FieldValue,
    MessageDescriptor, MessageRegistry, ScalarType,
};

const MIXED: u8 = 150;

fn registry() -> MessageRegistry {
    let mut registry = MessageRegistry::builtin().unwrap();
    registry
        .register(
            MessageDescriptor::new(
                MIXED,
                "MIXED_TYPES",
                [
                    ("a", FieldType::Scalar(ScalarType::I64)),
                    ("b", FieldType::Scalar(ScalarType::F64)),
                    ("c", FieldType::Array(ScalarType::I16, 3)),
                    ("d", FieldType::Array(ScalarType::U8, 5)),
                    ("e", FieldType::Scalar(ScalarType::I8)),
                    ("f", FieldType::Scalar(ScalarType::Char)),
                    ("g", FieldType::Scalar(ScalarType::U64)),
                ],
            )
            .unwrap(),
        )
        .unwrap();
    registry
}

fn scalar_strategy(ty: ScalarType) -> BoxedStrategy<FieldValue> {
    match ty {
        ScalarType::U8 => any::<u8>().prop_map(FieldValue::U8).boxed(),
        ScalarType::I8 => any::<i8>().prop_map(FieldValue::I8).boxed(),
        ScalarType::U16 => any::<u16>().prop_map(FieldValue::U16).boxed(),
        ScalarType::I16 => any::<i16>().prop_map(FieldValue::I16).boxed(),
        ScalarType::U32 => any::<u32>().prop_map(FieldValue::U32).boxed(),
        ScalarType::I32 => any::<i32>().prop_map(FieldValue::I32).boxed(),
        ScalarType::U64 => any::<u64>().prop_map(FieldValue::U64).boxed(),
        ScalarType::I64 => any::<i64>().prop_map(FieldValue::I64).boxed(),
        ScalarType::F32 => (prop::num::f32::NORMAL | prop::num::f32::ZERO)
            .prop_map(FieldValue::F32)
            .boxed(),
        ScalarType::F64 => (prop::num::f64::NORMAL | prop::num::f64::ZERO)
            .prop_map(FieldValue::F64)
            .boxed(),
        ScalarType::Char => any::<u8>().prop_map(FieldValue::Char).boxed(),
    }
}

fn value_strategy(ty: FieldType) -> BoxedStrategy<FieldValue> {
    match ty {
        FieldType::Scalar(scalar) => scalar_strategy(scalar),
        FieldType::Array(ScalarType::Char, len) => {
            // Any bytes, including NULs and invalid UTF-8.
            prop::collection::vec(any::<u8>(), 0..=len as usize)
                .prop_map(|bytes| FieldValue::Text(CharArray::new(bytes)))
                .boxed()
        }
        FieldType::Array(ScalarType::U8, len) => {
            prop::collection::vec(any::<u8>(), len as usize)
                .prop_map(FieldValue::Bytes)
                .boxed()
        }
        FieldType::Array(scalar, len) => {
            prop::collection::vec(scalar_strategy(scalar), len as usize)
                .prop_map(FieldValue::Array)
                .boxed()
        }
    }
}

/// A registered message id with a full set of valid values.
fn message_strategy() -> impl Strategy<Value = (u8, Vec<FieldValue>)> {
    let descriptors: Vec<MessageDescriptor> =
        registry().descriptors().into_iter().cloned().collect();
    prop::sample::select(descriptors).prop_flat_map(|descriptor| {
        let values: Vec<_> = descriptor
            .fields()
            .iter()
            .map(|field| value_strategy(field.ty))
            .collect();
        (Just(descriptor.id()), values)
    })
}

fn frame_strategy() -> impl Strategy<Value = Frame> {
    (message_strategy(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(
        |((id, values), system, component, sequence)| {
            pack(&registry(), system, component, id, &values, sequence).unwrap()
        },
    )
}

fn feed_all(parser: &mut ParserState, registry: &MessageRegistry, bytes: &[u8]) -> Vec<ParseOutcome> {
    parser.feed_slice(registry, bytes)
}

proptest! {
    #[test]
    fn round_trip_reproduces_values(
        (id, values) in message_strategy(),
        system in any::<u8>(),
        component in any::<u8>(),
        sequence in any::<u8>(),
    ) {
        let registry = registry();
        let frame = pack(&registry, system, component, id, &values, sequence).unwrap();
        let wire = pack_into_wire_bytes(&frame);
        prop_assert_eq!(wire.len(), frame.wire_size());

        let mut parser = ParserState::new();
        let outcomes = feed_all(&mut parser, &registry, &wire);
        prop_assert_eq!(outcomes.len(), 1);
        let received = outcomes[0].clone().into_frame().unwrap();
        prop_assert_eq!(&received, &frame);

        let decoded = decode_message(&registry, &received).unwrap();
        prop_assert_eq!(decoded.values, values);
    }

    #[test]
    fn char_array_value_survives_the_wire(bytes in prop::collection::vec(any::<u8>(), 0..=16)) {
        let field = FieldDescriptor::new("text", FieldType::Array(ScalarType::Char, 16), 0);
        let value = FieldValue::Text(CharArray::new(bytes));

        let mut wire = Vec::new();
        encode_field(&value, &field, &mut wire).unwrap();
        prop_assert_eq!(wire.len(), 16);
        prop_assert_eq!(decode_field(&wire, &field).unwrap(), value);
    }

    #[test]
    fn char_array_wire_bytes_are_reproduced(wire in prop::collection::vec(any::<u8>(), 16)) {
        let field = FieldDescriptor::new("text", FieldType::Array(ScalarType::Char, 16), 0);
        let value = decode_field(&wire, &field).unwrap();

        let mut reencoded = Vec::new();
        encode_field(&value, &field, &mut reencoded).unwrap();
        prop_assert_eq!(reencoded, wire);
    }

    #[test]
    fn statustext_frame_repacks_identically(
        severity in any::<u8>(),
        text in prop::collection::vec(any::<u8>(), 50),
        sequence in any::<u8>(),
    ) {
        let registry = registry();
        let descriptor = registry.lookup(STATUSTEXT).unwrap();
        let mut payload = vec![severity];
        payload.extend_from_slice(&text);
        let frame = Frame::new(sequence, 1, 1, STATUSTEXT, payload, descriptor.crc_extra()).unwrap();

        let decoded = decode_message(&registry, &frame).unwrap();
        let repacked = pack(&registry, 1, 1, STATUSTEXT, &decoded.values, sequence).unwrap();
        prop_assert_eq!(pack_into_wire_bytes(&repacked), pack_into_wire_bytes(&frame));
    }

    #[test]
    fn single_bit_flip_is_rejected(frame in frame_strategy(), bit in any::<prop::sample::Index>()) {
        let registry = registry();
        let mut wire = pack_into_wire_bytes(&frame).to_vec();
        // Everything after the start marker.
        let bit = 8 + bit.index((wire.len() - 1) * 8);
        wire[bit / 8] ^= 1 << (bit % 8);
        wire.extend(std::iter::repeat(0u8).take(MAX_FRAME_SIZE));

        let mut parser = ParserState::new();
        let outcomes = feed_all(&mut parser, &registry, &wire);
        prop_assert!(outcomes.iter().all(|o| !matches!(o, ParseOutcome::FrameReady(_))));
        prop_assert!(parser.dropped_frame_count() >= 1);
    }

    #[test]
    fn resynchronizes_after_marker_free_noise(
        noise in prop::collection::vec(any::<u8>().prop_filter("no start marker", |b| *b != START_MARKER), 0..512),
        frame in frame_strategy(),
    ) {
        let registry = registry();
        let mut wire = noise.clone();
        wire.extend_from_slice(&pack_into_wire_bytes(&frame));

        let mut parser = ParserState::new();
        let outcomes = feed_all(&mut parser, &registry, &wire);
        prop_assert_eq!(outcomes, vec![ParseOutcome::FrameReady(frame)]);
        prop_assert_eq!(parser.stats().bytes_discarded, noise.len() as u64);
    }

    #[test]
    fn resynchronizes_after_arbitrary_noise(
        noise in prop::collection::vec(any::<u8>(), 0..512),
        frame in frame_strategy(),
    ) {
        let registry = registry();
        // A spurious marker in the noise can start a candidate frame of up to
        // MAX_FRAME_SIZE bytes; the filler lets it run out before the real frame.
        let mut wire = noise;
        wire.extend(std::iter::repeat(0u8).take(MAX_FRAME_SIZE));
        wire.extend_from_slice(&pack_into_wire_bytes(&frame));

        let mut parser = ParserState::new();
        let outcomes = feed_all(&mut parser, &registry, &wire);
        prop_assert_eq!(outcomes.last(), Some(&ParseOutcome::FrameReady(frame)));
    }

    #[test]
    fn interleaved_channels_stay_isolated(a in frame_strategy(), b in frame_strategy()) {
        let mut mux = ChannelMux::new(Arc::new(registry()));
        let wire_a = pack_into_wire_bytes(&a);
        let wire_b = pack_into_wire_bytes(&b);

        let mut got_a = Vec::new();
        let mut got_b = Vec::new();
        for i in 0..wire_a.len().max(wire_b.len()) {
            if let Some(&byte) = wire_a.get(i) {
                got_a.extend(mux.feed(COMM_0, byte).into_frame());
            }
            if let Some(&byte) = wire_b.get(i) {
                got_b.extend(mux.feed(COMM_1, byte).into_frame());
            }
        }

        prop_assert_eq!(got_a, vec![a]);
        prop_assert_eq!(got_b, vec![b]);
    }
}

#[test]
fn sequence_wraps_after_256_frames() {
    let registry = registry();
    let mut mux = ChannelMux::new(Arc::new(registry.clone()));
    let mut parser = ParserState::new();

    let mut sequences = Vec::new();
    for i in 0..=256u16 {
        let sequence = mux.next_sequence(COMM_0);
        let frame = pack(
            &registry,
            1,
            1,
            telelink_schema::catalog::PI_TRIGGER,
            &[FieldValue::U8(i as u8)],
            sequence,
        )
        .unwrap();
        let outcomes = parser.feed_slice(&registry, &pack_into_wire_bytes(&frame));
        let received = outcomes[0].clone().into_frame().unwrap();
        sequences.push(received.sequence());
    }

    let expected: Vec<u8> = (0..=255u8).chain(std::iter::once(0)).collect();
    assert_eq!(sequences, expected);
    assert_eq!(parser.stats().sequence_gaps, 0);
    assert_eq!(parser.stats().frames_received, 257);
}

#[test]
fn concrete_pi_trigger_scenario() {
    let registry = registry();
    let descriptor = registry.lookup(185).unwrap();
    assert_eq!(descriptor.payload_length(), 1);
    assert_eq!(descriptor.crc_extra(), 145);
    assert_eq!(descriptor.fields()[0].offset, 0);

    let (seq, sys, comp) = (7u8, 42u8, 110u8);
    let frame = pack(&registry, sys, comp, 185, &[FieldValue::U8(123)], seq).unwrap();
    let wire = pack_into_wire_bytes(&frame);
    let crc = telelink_schema::crc16_x25(&[1, seq, sys, comp, 185, 123, 145]);
    let [lo, hi] = crc.to_le_bytes();
    assert_eq!(wire.as_ref(), &[START_MARKER, 1, seq, sys, comp, 185, 123, lo, hi]);

    let mut parser = ParserState::new();
    let mut ready = None;
    for &byte in wire.iter() {
        if let ParseOutcome::FrameReady(frame) = parser.feed_byte(&registry, byte) {
            ready = Some(frame);
        }
    }
    let frame = ready.unwrap();
    assert_eq!(frame.message_id(), 185);
    let decoded = decode_message(&registry, &frame).unwrap();
    assert_eq!(decoded.values, vec![FieldValue::U8(123)]);
}
