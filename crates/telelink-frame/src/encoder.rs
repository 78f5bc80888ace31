//! Data-driven message packing and typed decoding.
//!
//! One [`Encoder`] serves every message id: the descriptor found in the
//! registry supplies the payload layout and the checksum seed.

use bytes::BytesMut;
use telelink_schema::{FieldValue, MessageDescriptor, MessageRegistry};

use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// Packs typed field values into frames.
///
/// Reads the registry and nothing else: sequence bookkeeping belongs to the
/// caller (see [`ChannelMux::next_sequence`](crate::channel::ChannelMux::next_sequence)).
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'r> {
    registry: &'r MessageRegistry,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r MessageRegistry) -> Self {
        Self { registry }
    }

    /// Serialize `values` for `message_id` and wrap them in a checksummed frame.
    pub fn pack(
        &self,
        system_id: u8,
        component_id: u8,
        message_id: u8,
        values: &[FieldValue],
        sequence: u8,
    ) -> Result<Frame> {
        let descriptor = self.descriptor(message_id)?;

        let mut payload = BytesMut::with_capacity(descriptor.payload_length() as usize);
        descriptor.encode_payload(values, &mut payload)?;

        Frame::new(
            sequence,
            system_id,
            component_id,
            message_id,
            payload.freeze(),
            descriptor.crc_extra(),
        )
    }

    /// Wrap an already serialized payload, checking only its length.
    pub fn pack_raw(
        &self,
        system_id: u8,
        component_id: u8,
        message_id: u8,
        payload: &[u8],
        sequence: u8,
    ) -> Result<Frame> {
        let descriptor = self.descriptor(message_id)?;
        let expected = descriptor.payload_length() as usize;
        if payload.len() != expected {
            return Err(FrameError::PayloadLengthMismatch {
                message_id,
                expected,
                actual: payload.len(),
            });
        }

        Frame::new(
            sequence,
            system_id,
            component_id,
            message_id,
            payload.to_vec(),
            descriptor.crc_extra(),
        )
    }

    fn descriptor(&self, message_id: u8) -> Result<&'r MessageDescriptor> {
        self.registry
            .lookup(message_id)
            .ok_or(FrameError::UnknownMessage(message_id))
    }
}

/// Convenience wrapper around [`Encoder::pack`].
pub fn pack(
    registry: &MessageRegistry,
    system_id: u8,
    component_id: u8,
    message_id: u8,
    values: &[FieldValue],
    sequence: u8,
) -> Result<Frame> {
    Encoder::new(registry).pack(system_id, component_id, message_id, values, sequence)
}

/// A received frame together with its decoded field values.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub frame: Frame,
    pub descriptor: MessageDescriptor,
    pub values: Vec<FieldValue>,
}

impl DecodedMessage {
    /// Message name from the descriptor.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Value of the field called `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.descriptor
            .field_index(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// `(field name, value)` pairs in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.descriptor
            .fields()
            .iter()
            .map(|field| field.name.as_str())
            .zip(self.values.iter())
    }
}

/// Decode the payload of a validated frame into typed values.
pub fn decode_message(registry: &MessageRegistry, frame: &Frame) -> Result<DecodedMessage> {
    let descriptor = registry
        .lookup(frame.message_id())
        .ok_or(FrameError::UnknownMessage(frame.message_id()))?;
    let values = descriptor.decode_payload(frame.payload())?;

    Ok(DecodedMessage {
        frame: frame.clone(),
        descriptor: descriptor.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use telelink_schema::catalog::{HEARTBEAT, PI_TRIGGER, STATUSTEXT};
    use telelink_schema::{FieldType, ScalarType, SchemaError};

    use super::*;
    use crate::codec::pack_into_wire_bytes;

    fn registry() -> MessageRegistry {
        MessageRegistry::builtin().unwrap()
    }

    #[test]
    fn pack_pi_trigger() {
        let registry = registry();
        let frame = Encoder::new(&registry)
            .pack(255, 1, PI_TRIGGER, &[FieldValue::U8(123)], 0)
            .unwrap();

        assert_eq!(frame.message_id(), PI_TRIGGER);
        assert_eq!(frame.payload().as_ref(), &[123]);
        assert_eq!(
            pack_into_wire_bytes(&frame).as_ref(),
            &[0xFE, 1, 0, 255, 1, 185, 123, 0x8B, 0x82]
        );
    }

    #[test]
    fn pack_is_repeatable() {
        let registry = registry();
        let a = pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::U8(9)], 4).unwrap();
        let b = pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::U8(9)], 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_message_rejected() {
        let registry = registry();
        let err = pack(&registry, 1, 1, 200, &[], 0).unwrap_err();
        assert!(matches!(err, FrameError::UnknownMessage(200)));
    }

    #[test]
    fn field_count_mismatch_rejected() {
        let registry = registry();
        let err = pack(&registry, 1, 1, PI_TRIGGER, &[], 0).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Schema(SchemaError::FieldCountMismatch {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn field_type_mismatch_rejected() {
        let registry = registry();
        let err = pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::F32(1.0)], 0).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Schema(SchemaError::FieldTypeMismatch { .. })
        ));
    }

    #[test]
    fn pack_raw_checks_length() {
        let registry = registry();
        let encoder = Encoder::new(&registry);

        let frame = encoder.pack_raw(1, 1, PI_TRIGGER, &[5], 0).unwrap();
        assert_eq!(frame.payload().as_ref(), &[5]);

        let err = encoder.pack_raw(1, 1, PI_TRIGGER, &[5, 6], 0).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadLengthMismatch {
                message_id: PI_TRIGGER,
                expected: 1,
                actual: 2
            }
        ));
    }

    #[test]
    fn decode_message_by_field_name() {
        let registry = registry();
        let values = [
            FieldValue::U32(7),
            FieldValue::U8(2),
            FieldValue::U8(3),
            FieldValue::U8(81),
            FieldValue::U8(4),
            FieldValue::U8(3),
        ];
        let frame = pack(&registry, 1, 1, HEARTBEAT, &values, 0).unwrap();
        let decoded = decode_message(&registry, &frame).unwrap();

        assert_eq!(decoded.name(), "HEARTBEAT");
        assert_eq!(decoded.get("custom_mode"), Some(&FieldValue::U32(7)));
        assert_eq!(decoded.get("base_mode"), Some(&FieldValue::U8(81)));
        assert_eq!(decoded.get("missing"), None);
        assert_eq!(decoded.values, values);
        assert_eq!(decoded.fields().count(), 6);
    }

    #[test]
    fn decode_text_field() {
        let registry = registry();
        let frame = pack(
            &registry,
            1,
            1,
            STATUSTEXT,
            &[FieldValue::U8(6), FieldValue::from("armed")],
            0,
        )
        .unwrap();
        let decoded = decode_message(&registry, &frame).unwrap();
        assert_eq!(decoded.get("text").and_then(FieldValue::as_str), Some("armed"));
    }

    #[test]
    fn zero_length_message() {
        let descriptor =
            MessageDescriptor::new(9, "PING_EMPTY", std::iter::empty::<(&str, FieldType)>()).unwrap();
        let mut registry = MessageRegistry::new();
        registry.register(descriptor).unwrap();

        let frame = pack(&registry, 1, 1, 9, &[], 0).unwrap();
        assert_eq!(frame.payload_length(), 0);
        assert!(decode_message(&registry, &frame).unwrap().values.is_empty());
    }

    #[test]
    fn decode_unknown_message_fails() {
        let registry = registry();
        let frame = Frame::new(0, 1, 1, 201, vec![1u8], 0).unwrap();
        assert!(matches!(
            decode_message(&registry, &frame),
            Err(FrameError::UnknownMessage(201))
        ));
    }

    #[test]
    fn scalar_type_of_pi_trigger() {
        let registry = registry();
        let descriptor = registry.lookup(PI_TRIGGER).unwrap();
        assert_eq!(descriptor.fields()[0].ty, FieldType::Scalar(ScalarType::U8));
    }
}
