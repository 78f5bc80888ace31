//! Byte-at-a-time frame parser.
//!
//! Each [`ParserState`] reconstructs frames from one byte stream. Noise before
//! a start marker is skipped; any corrupted frame is dropped once fully
//! consumed and the parser goes back to scanning for the next start marker.
//! Bytes inside a candidate frame are never rescanned for a start marker, so
//! a corrupted frame delays resynchronization until it has been read out.

use std::fmt;

use bytes::BytesMut;
use telelink_schema::{Crc16, MessageRegistry};

use crate::codec::{Frame, MAX_PAYLOAD, START_MARKER};

/// What the parser has received of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Scanning for a start marker.
    Idle,
    GotStart,
    GotLength,
    GotSequence,
    GotSystemId,
    GotComponentId,
    GotMessageId,
    /// Some, but not all, payload bytes.
    InPayload,
    GotPayload,
    GotChecksumLow,
}

/// Why a fully received candidate frame was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Corrupted in transit, or the sender uses a different message layout.
    ChecksumMismatch { expected: u16, received: u16 },
    /// No descriptor for the message id.
    UnknownMessage(u8),
    /// LEN disagrees with the registered payload length.
    LengthMismatch {
        message_id: u8,
        expected: u8,
        declared: u8,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { expected, received } => write!(
                f,
                "checksum mismatch (expected {expected:#06x}, received {received:#06x})"
            ),
            Self::UnknownMessage(id) => write!(f, "unknown message id {id}"),
            Self::LengthMismatch {
                message_id,
                expected,
                declared,
            } => write!(
                f,
                "message {message_id} declares {declared} payload bytes, expected {expected}"
            ),
        }
    }
}

/// Result of feeding one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Incomplete,
    FrameReady(Frame),
    FrameRejected(RejectReason),
}

impl ParseOutcome {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }

    /// The completed frame, if any.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::FrameReady(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Receive counters of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Frames that passed validation.
    pub frames_received: u64,
    /// Candidate frames rejected after being fully received.
    pub dropped_frame_count: u64,
    /// Frames presumed lost, inferred from jumps in received sequence numbers.
    pub sequence_gaps: u64,
    /// Bytes skipped while scanning for a start marker.
    pub bytes_discarded: u64,
    /// Sequence number of the last valid frame.
    pub last_sequence: Option<u8>,
}

/// Parser state for one channel.
#[derive(Debug, Clone)]
pub struct ParserState {
    phase: Phase,
    payload_length: u8,
    sequence: u8,
    system_id: u8,
    component_id: u8,
    message_id: u8,
    payload: BytesMut,
    checksum_low: u8,
    crc: Crc16,
    stats: ChannelStats,
}

impl ParserState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            payload_length: 0,
            sequence: 0,
            system_id: 0,
            component_id: 0,
            message_id: 0,
            payload: BytesMut::with_capacity(MAX_PAYLOAD),
            checksum_low: 0,
            crc: Crc16::new(),
            stats: ChannelStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn dropped_frame_count(&self) -> u64 {
        self.stats.dropped_frame_count
    }

    /// Payload bytes accumulated for the frame in progress.
    pub fn buffered_payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Abandon any partially received frame. Counters are kept.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.payload.clear();
        self.crc = Crc16::new();
    }

    /// Advance the state machine by one byte.
    ///
    /// The registry is consulted only once the whole candidate frame is in:
    /// unknown ids and length mismatches are dropped like corrupt frames.
    pub fn feed_byte(&mut self, registry: &MessageRegistry, byte: u8) -> ParseOutcome {
        match self.phase {
            Phase::Idle => {
                if byte == START_MARKER {
                    self.begin_frame();
                } else {
                    self.stats.bytes_discarded += 1;
                }
            }
            Phase::GotStart => {
                self.payload_length = byte;
                self.crc.accumulate(byte);
                self.phase = Phase::GotLength;
            }
            Phase::GotLength => {
                self.sequence = byte;
                self.crc.accumulate(byte);
                self.phase = Phase::GotSequence;
            }
            Phase::GotSequence => {
                self.system_id = byte;
                self.crc.accumulate(byte);
                self.phase = Phase::GotSystemId;
            }
            Phase::GotSystemId => {
                self.component_id = byte;
                self.crc.accumulate(byte);
                self.phase = Phase::GotComponentId;
            }
            Phase::GotComponentId => {
                self.message_id = byte;
                self.crc.accumulate(byte);
                self.phase = Phase::GotMessageId;
            }
            Phase::GotMessageId | Phase::InPayload
                if self.payload.len() < self.payload_length as usize =>
            {
                self.payload.extend_from_slice(&[byte]);
                self.crc.accumulate(byte);
                self.phase = if self.payload.len() == self.payload_length as usize {
                    Phase::GotPayload
                } else {
                    Phase::InPayload
                };
            }
            Phase::GotMessageId | Phase::InPayload | Phase::GotPayload => {
                self.checksum_low = byte;
                self.phase = Phase::GotChecksumLow;
            }
            Phase::GotChecksumLow => {
                let received = u16::from_le_bytes([self.checksum_low, byte]);
                return self.finish_frame(registry, received);
            }
        }

        ParseOutcome::Incomplete
    }

    /// Feed a run of bytes, collecting every non-incomplete outcome.
    pub fn feed_slice(&mut self, registry: &MessageRegistry, bytes: &[u8]) -> Vec<ParseOutcome> {
        bytes
            .iter()
            .map(|&byte| self.feed_byte(registry, byte))
            .filter(|outcome| !outcome.is_incomplete())
            .collect()
    }

    fn begin_frame(&mut self) {
        self.phase = Phase::GotStart;
        self.payload.clear();
        self.crc = Crc16::new();
    }

    fn finish_frame(&mut self, registry: &MessageRegistry, received: u16) -> ParseOutcome {
        let verdict = match registry.lookup(self.message_id) {
            None => Err(RejectReason::UnknownMessage(self.message_id)),
            Some(descriptor) if descriptor.payload_length() != self.payload_length => {
                Err(RejectReason::LengthMismatch {
                    message_id: self.message_id,
                    expected: descriptor.payload_length(),
                    declared: self.payload_length,
                })
            }
            Some(descriptor) => {
                let mut crc = self.crc;
                crc.accumulate(descriptor.crc_extra());
                if crc.value() == received {
                    Ok(())
                } else {
                    Err(RejectReason::ChecksumMismatch {
                        expected: crc.value(),
                        received,
                    })
                }
            }
        };

        let outcome = match verdict {
            Ok(()) => {
                let frame = Frame::from_verified(
                    self.sequence,
                    self.system_id,
                    self.component_id,
                    self.message_id,
                    self.payload.split().freeze(),
                    received,
                );
                self.record_sequence(frame.sequence());
                ParseOutcome::FrameReady(frame)
            }
            Err(reason) => {
                self.stats.dropped_frame_count += 1;
                ParseOutcome::FrameRejected(reason)
            }
        };

        self.reset();
        outcome
    }

    fn record_sequence(&mut self, sequence: u8) {
        if let Some(last) = self.stats.last_sequence {
            let skipped = sequence.wrapping_sub(last.wrapping_add(1));
            self.stats.sequence_gaps += u64::from(skipped);
        }
        self.stats.last_sequence = Some(sequence);
        self.stats.frames_received += 1;
    }
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new()
    }
}
