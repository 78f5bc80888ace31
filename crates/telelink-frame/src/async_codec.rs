//! `tokio_util` codec driving the same byte-at-a-time parser.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use telelink_schema::MessageRegistry;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame};
use crate::error::FrameError;
use crate::parser::{ChannelStats, ParserState};
use crate::reader::accept;

/// Frames a tokio byte stream. Use with `FramedRead`, `FramedWrite` or `Framed`.
#[derive(Debug)]
pub struct TelemetryCodec {
    registry: Arc<MessageRegistry>,
    parser: ParserState,
}

impl TelemetryCodec {
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self {
            registry,
            parser: ParserState::new(),
        }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> ChannelStats {
        self.parser.stats()
    }
}

impl Decoder for TelemetryCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        // Every byte is consumed: partial frames live in the parser, not in `src`.
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(frame) = accept(&mut self.parser, &self.registry, byte) {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}

impl Encoder<Frame> for TelemetryCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&frame, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use telelink_schema::catalog::PI_TRIGGER;
    use telelink_schema::FieldValue;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::pack_into_wire_bytes;
    use crate::encoder::pack;

    fn registry() -> Arc<MessageRegistry> {
        Arc::new(MessageRegistry::builtin().unwrap())
    }

    #[test]
    fn decode_across_split_buffers() {
        let registry = registry();
        let frame = pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::U8(3)], 0).unwrap();
        let wire = pack_into_wire_bytes(&frame);
        let mut codec = TelemetryCodec::new(registry);

        let mut buf = BytesMut::from(&wire[..4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        buf.extend_from_slice(&wire[4..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(frame));
    }

    #[tokio::test]
    async fn framed_round_trip() {
        let registry = registry();
        let frames: Vec<Frame> = (0..4u8)
            .map(|seq| pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::U8(seq * 10)], seq).unwrap())
            .collect();

        let mut sink = FramedWrite::new(Vec::new(), TelemetryCodec::new(Arc::clone(&registry)));
        for frame in frames.clone() {
            sink.send(frame).await.unwrap();
        }
        let mut wire = sink.into_inner();
        wire.insert(0, 0x55);

        let mut stream = FramedRead::new(wire.as_slice(), TelemetryCodec::new(registry));
        let mut received = Vec::new();
        while let Some(frame) = stream.next().await {
            received.push(frame.unwrap());
        }

        assert_eq!(received, frames);
        assert_eq!(stream.decoder().stats().bytes_discarded, 1);
    }

    #[tokio::test]
    async fn corrupted_frames_are_skipped() {
        let registry = registry();
        let good = pack(&registry, 1, 1, PI_TRIGGER, &[FieldValue::U8(1)], 0).unwrap();
        let mut wire = pack_into_wire_bytes(&good).to_vec();
        wire[6] ^= 0x02;
        wire.extend_from_slice(&pack_into_wire_bytes(&good));

        let mut stream = FramedRead::new(wire.as_slice(), TelemetryCodec::new(registry));
        assert_eq!(stream.next().await.unwrap().unwrap(), good);
        assert!(stream.next().await.is_none());
        assert_eq!(stream.decoder().stats().dropped_frame_count, 1);
    }
}
