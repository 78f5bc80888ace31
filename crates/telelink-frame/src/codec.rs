use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use telelink_schema::Crc16;

use crate::error::{FrameError, Result};

/// Start-of-frame sentinel (protocol version 1.0).
pub const START_MARKER: u8 = 0xFE;

/// Header: start (1) + length (1) + sequence (1) + system (1) + component (1) + message id (1).
pub const HEADER_SIZE: usize = 6;

/// Trailing checksum, low byte first.
pub const CHECKSUM_SIZE: usize = 2;

/// Bytes every frame carries besides its payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Largest possible frame on the wire.
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD;

/// Default sender system id (ground station).
pub const DEFAULT_SYSTEM_ID: u8 = 255;

/// Default sender component id.
pub const DEFAULT_COMPONENT_ID: u8 = 1;

/// One wire-level frame: header fields, owned payload and checksum.
///
/// Fields are read-only once the checksum has been computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    sequence: u8,
    system_id: u8,
    component_id: u8,
    message_id: u8,
    payload: Bytes,
    checksum: u16,
}

impl Frame {
    /// Build a frame around an already serialized payload and compute its checksum.
    pub fn new(
        sequence: u8,
        system_id: u8,
        component_id: u8,
        message_id: u8,
        payload: impl Into<Bytes>,
        crc_extra: u8,
    ) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let header = [
            payload.len() as u8,
            sequence,
            system_id,
            component_id,
            message_id,
        ];
        let checksum = frame_checksum(&header, &payload, crc_extra);

        Ok(Self {
            sequence,
            system_id,
            component_id,
            message_id,
            payload,
            checksum,
        })
    }

    /// Reassemble a frame whose checksum has already been verified.
    pub(crate) fn from_verified(
        sequence: u8,
        system_id: u8,
        component_id: u8,
        message_id: u8,
        payload: Bytes,
        checksum: u16,
    ) -> Self {
        Self {
            sequence,
            system_id,
            component_id,
            message_id,
            payload,
            checksum,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn system_id(&self) -> u8 {
        self.system_id
    }

    pub fn component_id(&self) -> u8 {
        self.component_id
    }

    pub fn message_id(&self) -> u8 {
        self.message_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Value of the LEN byte.
    pub fn payload_length(&self) -> u8 {
        // Constructors cap the payload at MAX_PAYLOAD.
        self.payload.len() as u8
    }

    /// The five checksummed header bytes after the start marker.
    pub fn header_bytes(&self) -> [u8; 5] {
        [
            self.payload_length(),
            self.sequence,
            self.system_id,
            self.component_id,
            self.message_id,
        ]
    }

    /// The total wire size of this frame (overhead + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Whether the stored checksum matches the one computed with `crc_extra`.
    pub fn verify(&self, crc_extra: u8) -> bool {
        frame_checksum(&self.header_bytes(), &self.payload, crc_extra) == self.checksum
    }
}

/// CRC-16/X.25 over the header bytes and payload, seeded last with `crc_extra`.
pub fn frame_checksum(header: &[u8; 5], payload: &[u8], crc_extra: u8) -> u16 {
    let mut crc = Crc16::new();
    crc.accumulate_slice(header);
    crc.accumulate_slice(payload);
    crc.accumulate(crc_extra);
    crc.value()
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────┬─────┬─────┬─────┬──────┬───────┬───────────┬───────┬───────┐
/// │ START │ LEN │ SEQ │ SYS │ COMP │ MSGID │ PAYLOAD   │ CK_LO │ CK_HI │
/// │ 0xFE  │     │     │     │      │       │ (LEN B)   │       │       │
/// └───────┴─────┴─────┴─────┴──────┴───────┴───────────┴───────┴───────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(frame.wire_size());
    dst.put_u8(START_MARKER);
    dst.put_slice(&frame.header_bytes());
    dst.put_slice(&frame.payload);
    dst.put_u16_le(frame.checksum);
}

/// Lay out a frame as a standalone byte buffer.
pub fn pack_into_wire_bytes(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.wire_size());
    encode_frame(frame, &mut buf);
    buf.freeze()
}

/// Configuration for frame senders and readers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// System id stamped on outgoing frames. Default: 255.
    pub system_id: u8,
    /// Component id stamped on outgoing frames. Default: 1.
    pub component_id: u8,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            system_id: DEFAULT_SYSTEM_ID,
            component_id: DEFAULT_COMPONENT_ID,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
