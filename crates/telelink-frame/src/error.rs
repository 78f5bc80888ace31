use telelink_schema::SchemaError;
use telelink_transport::TransportError;

use crate::parser::Phase;

/// Errors that can occur while packing, writing or reading frames.
///
/// Corrupted input on the receive path is not an error: the parser reports it
/// as [`ParseOutcome::FrameRejected`](crate::parser::ParseOutcome) and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message id has no descriptor in the registry.
    #[error("unknown message id {0}")]
    UnknownMessage(u8),

    /// Field values did not fit the message descriptor.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The payload does not fit in the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A raw payload does not match the descriptor's declared length.
    #[error("message {message_id}: payload is {actual} bytes, descriptor declares {expected}")]
    PayloadLengthMismatch {
        message_id: u8,
        expected: usize,
        actual: usize,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The link closed while a frame was partially received.
    #[error("connection closed mid-frame (parser at {phase:?})")]
    ClosedMidFrame { phase: Phase },

    /// The byte transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Fold a closed transport into [`FrameError::ConnectionClosed`].
    pub(crate) fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Closed => Self::ConnectionClosed,
            other => Self::Transport(other),
        }
    }

    /// End of stream, distinguishing a clean close between frames from one
    /// that cut a frame short.
    pub(crate) fn closed_at(phase: Phase) -> Self {
        match phase {
            Phase::Idle => Self::ConnectionClosed,
            phase => Self::ClosedMidFrame { phase },
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
