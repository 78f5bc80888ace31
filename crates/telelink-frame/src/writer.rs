use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::BytesMut;
use telelink_schema::{FieldValue, MessageRegistry};
use telelink_transport::LinkTransport;
use tracing::trace;

use crate::codec::{encode_frame, pack_into_wire_bytes, Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::encoder::Encoder;
use crate::error::{FrameError, Result};

/// Writes complete frames to any `Write` stream.
///
/// Stamps outgoing frames with the configured sender identity and its own
/// transmit sequence, which wraps after 255.
pub struct FrameWriter<T> {
    inner: T,
    registry: Arc<MessageRegistry>,
    buf: BytesMut,
    config: FrameConfig,
    sequence: u8,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, registry: Arc<MessageRegistry>) -> Self {
        Self::with_config(inner, registry, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, registry: Arc<MessageRegistry>, config: FrameConfig) -> Self {
        Self {
            inner,
            registry,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            config,
            sequence: 0,
        }
    }

    /// Pack `values` for `message_id`, write the frame and flush.
    ///
    /// The sequence number only advances once the frame has been written.
    pub fn send(&mut self, message_id: u8, values: &[FieldValue]) -> Result<Frame> {
        let frame = Encoder::new(&self.registry).pack(
            self.config.system_id,
            self.config.component_id,
            message_id,
            values,
            self.sequence,
        )?;
        self.write_frame(&frame)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    /// Write a complete frame (blocking) and flush.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        trace!(
            message_id = frame.message_id(),
            sequence = frame.sequence(),
            bytes = frame.wire_size(),
            "frame written"
        );
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Sequence number the next `send` will use.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Override the next sequence number.
    pub fn set_sequence(&mut self, sequence: u8) {
        self.sequence = sequence;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameWriter<std::os::unix::net::UnixStream> {
    /// Create a frame writer for a Unix stream and apply the write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        registry: Arc<MessageRegistry>,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, registry, config))
    }
}

/// Write a frame to `transport` and wait until it has drained.
pub fn transmit_frame<T: LinkTransport + ?Sized>(transport: &mut T, frame: &Frame) -> Result<()> {
    let wire = pack_into_wire_bytes(frame);
    transport
        .write_bytes(&wire)
        .map_err(FrameError::from_transport)?;
    transport
        .flush_until_drained()
        .map_err(FrameError::from_transport)
}
