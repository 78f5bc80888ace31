use std::io::{ErrorKind, Read};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use telelink_schema::MessageRegistry;
use telelink_transport::{LinkTransport, TransportError};
use tracing::warn;

use crate::codec::{Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::encoder::{decode_message, DecodedMessage};
use crate::error::{FrameError, Result};
use crate::parser::{ChannelStats, ParseOutcome, ParserState};

const READ_CHUNK_SIZE: usize = 512;

/// Reads validated frames from any `Read` stream.
///
/// Bytes are fed one at a time into a [`ParserState`]; rejected frames are
/// logged and skipped, so callers only ever see frames that passed the
/// checksum.
pub struct FrameReader<T> {
    inner: T,
    registry: Arc<MessageRegistry>,
    parser: ParserState,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, registry: Arc<MessageRegistry>) -> Self {
        Self::with_config(inner, registry, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, registry: Arc<MessageRegistry>, config: FrameConfig) -> Self {
        Self {
            inner,
            registry,
            parser: ParserState::new(),
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// At EOF returns `Err(FrameError::ConnectionClosed)`, or
    /// `Err(FrameError::ClosedMidFrame)` if a frame was cut short.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            while self.buf.has_remaining() {
                let byte = self.buf.get_u8();
                if let Some(frame) = accept(&mut self.parser, &self.registry, byte) {
                    return Ok(frame);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::closed_at(self.parser.phase()));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next valid frame and decode its fields.
    pub fn read_message(&mut self) -> Result<DecodedMessage> {
        let frame = self.read_frame()?;
        decode_message(&self.registry, &frame)
    }

    /// Receive counters of this stream.
    pub fn stats(&self) -> ChannelStats {
        self.parser.stats()
    }

    /// Abandon any partially received frame.
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<std::os::unix::net::UnixStream> {
    /// Create a frame reader for a Unix stream and apply the read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        registry: Arc<MessageRegistry>,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, registry, config))
    }
}

/// Pull bytes from `transport` until `parser` yields a valid frame.
pub fn receive_frame<T: LinkTransport + ?Sized>(
    transport: &mut T,
    parser: &mut ParserState,
    registry: &MessageRegistry,
) -> Result<Frame> {
    loop {
        let byte = transport.read_byte().map_err(|err| match err {
            TransportError::Closed => FrameError::closed_at(parser.phase()),
            other => FrameError::Transport(other),
        })?;
        if let Some(frame) = accept(parser, registry, byte) {
            return Ok(frame);
        }
    }
}

pub(crate) fn accept(parser: &mut ParserState, registry: &MessageRegistry, byte: u8) -> Option<Frame> {
    match parser.feed_byte(registry, byte) {
        ParseOutcome::FrameReady(frame) => Some(frame),
        ParseOutcome::FrameRejected(reason) => {
            warn!(%reason, dropped = parser.dropped_frame_count(), "frame rejected");
            None
        }
        ParseOutcome::Incomplete => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use telelink_schema::catalog::{PI_TRIGGER, STATUSTEXT};
    use telelink_schema::FieldValue;
    use telelink_transport::StreamTransport;

    use super::*;
    use crate::codec::encode_frame;
    use crate::encoder::pack;
    use crate::parser::Phase;

    fn registry() -> Arc<MessageRegistry> {
        Arc::new(MessageRegistry::builtin().unwrap())
    }

    fn trigger(registry: &MessageRegistry, value: u8, sequence: u8, wire: &mut BytesMut) {
        let frame = pack(registry, 255, 1, PI_TRIGGER, &[FieldValue::U8(value)], sequence).unwrap();
        encode_frame(&frame, wire);
    }

    #[test]
    fn read_single_frame() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 123, 0, &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.message_id(), PI_TRIGGER);
        assert_eq!(frame.payload().as_ref(), &[123]);
    }

    #[test]
    fn read_multiple_frames() {
        let registry = registry();
        let mut wire = BytesMut::new();
        for (seq, value) in [1u8, 2, 3].into_iter().enumerate() {
            trigger(&registry, value, seq as u8, &mut wire);
        }

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.sequence(), f1.payload().as_ref()), (0, [1u8].as_ref()));
        assert_eq!((f2.sequence(), f2.payload().as_ref()), (1, [2u8].as_ref()));
        assert_eq!((f3.sequence(), f3.payload().as_ref()), (2, [3u8].as_ref()));
        assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn read_message_decodes_fields() {
        let registry = registry();
        let frame = pack(
            &registry,
            1,
            1,
            STATUSTEXT,
            &[FieldValue::U8(4), FieldValue::from("low battery")],
            0,
        )
        .unwrap();
        let mut wire = BytesMut::new();
        encode_frame(&frame, &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);
        let message = reader.read_message().unwrap();

        assert_eq!(message.name(), "STATUSTEXT");
        assert_eq!(message.get("severity"), Some(&FieldValue::U8(4)));
        assert_eq!(
            message.get("text").and_then(FieldValue::as_str),
            Some("low battery")
        );
    }

    #[test]
    fn skips_corrupted_frame() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 1, 0, &mut wire);
        wire[6] ^= 0x10;
        trigger(&registry, 2, 1, &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload().as_ref(), &[2]);
        assert_eq!(reader.stats().dropped_frame_count, 1);
        assert_eq!(reader.stats().frames_received, 1);
    }

    #[test]
    fn eof_mid_frame_reports_the_phase() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 1, 0, &mut wire);
        wire.truncate(5);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::ClosedMidFrame {
                phase: Phase::GotComponentId
            }
        ));
        assert_eq!(
            err.to_string(),
            "connection closed mid-frame (parser at GotComponentId)"
        );
    }

    #[test]
    fn eof_between_frames_is_a_clean_close() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 1, 0, &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()), registry);
        reader.read_frame().unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn one_byte_reads() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 77, 9, &mut wire);

        let mut reader = FrameReader::new(
            OneByteReader {
                data: wire.to_vec(),
                pos: 0,
            },
            registry,
        );
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.sequence(), 9);
        assert_eq!(frame.payload().as_ref(), &[77]);
    }

    #[test]
    fn handles_interrupted_read() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 5, 0, &mut wire);

        let mut reader = FrameReader::new(
            InterruptedThenData {
                interrupted: false,
                inner: Cursor::new(wire.to_vec()),
            },
            registry,
        );
        assert_eq!(reader.read_frame().unwrap().payload().as_ref(), &[5]);
    }

    #[test]
    fn io_error_propagates() {
        let mut reader = FrameReader::new(BrokenReader, registry());
        assert!(matches!(reader.read_frame(), Err(FrameError::Io(_))));
    }

    #[test]
    fn reset_drops_partial_frame() {
        let registry = registry();
        let mut wire = BytesMut::new();
        trigger(&registry, 5, 0, &mut wire);
        let partial = wire[..4].to_vec();

        let mut reader = FrameReader::new(Cursor::new(partial), Arc::clone(&registry));
        assert!(reader.read_frame().is_err());
        reader.reset();
        *reader.get_mut() = Cursor::new(wire.to_vec());

        assert_eq!(reader.read_frame().unwrap().payload().as_ref(), &[5]);
        assert_eq!(reader.config().system_id, 255);
        let _ = reader.get_ref();
        let _inner = reader.into_inner();
    }

    #[test]
    fn receive_frame_from_transport() {
        let registry = registry();
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&[0x01, 0x02]);
        trigger(&registry, 42, 3, &mut wire);

        let mut transport = StreamTransport::new(Cursor::new(wire.to_vec()));
        let mut parser = ParserState::new();
        let frame = receive_frame(&mut transport, &mut parser, &registry).unwrap();

        assert_eq!(frame.payload().as_ref(), &[42]);
        assert_eq!(parser.stats().bytes_discarded, 2);
        assert!(matches!(
            receive_frame(&mut transport, &mut parser, &registry),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    #[cfg(unix)]
    fn applies_read_timeout_for_unix_stream() {
        let (stream, _peer) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_unix(stream, registry(), cfg).unwrap();
        assert!(matches!(reader.read_frame(), Err(FrameError::Io(_))));
    }

    struct OneByteReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for OneByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.data.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("boom"))
        }
    }
}
