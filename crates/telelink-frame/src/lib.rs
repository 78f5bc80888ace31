//! Checksum-protected telemetry framing with a resynchronizing stream parser.
//!
//! Every message travels in one frame:
//! - A start marker (`0xFE`)
//! - Payload length, sequence, sender system id, sender component id, message id (one byte each)
//! - The payload, laid out by the message's descriptor
//! - A CRC-16/X.25 checksum seeded with the descriptor's `crc_extra`, low byte first
//!
//! The parser takes one byte at a time, drops anything that fails validation
//! and picks up again at the next start marker.

pub mod channel;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use channel::{channel_name, ChannelId, ChannelMux, COMM_0, COMM_1, COMM_2, COMM_3};
pub use codec::{
    encode_frame, frame_checksum, pack_into_wire_bytes, Frame, FrameConfig, DEFAULT_COMPONENT_ID,
    DEFAULT_SYSTEM_ID, FRAME_OVERHEAD, HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD, START_MARKER,
};
pub use encoder::{decode_message, pack, DecodedMessage, Encoder};
pub use error::{FrameError, Result};
pub use parser::{ChannelStats, ParseOutcome, ParserState, Phase, RejectReason};
pub use reader::{receive_frame, FrameReader};
pub use writer::{transmit_frame, FrameWriter};

#[cfg(feature = "async")]
pub use async_codec::TelemetryCodec;
