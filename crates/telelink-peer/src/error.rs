use telelink_frame::FrameError;
use telelink_schema::SchemaError;
use telelink_transport::TransportError;

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Message schema error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// No registered message has this name.
    #[error("unknown message {0:?}")]
    UnknownMessageName(String),

    /// The link closed.
    #[error("link disconnected: {0}")]
    Disconnected(String),
}

impl PeerError {
    /// True when the link itself went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Disconnected(_)
                | Self::Transport(TransportError::Closed)
                | Self::Frame(FrameError::ConnectionClosed)
                | Self::Frame(FrameError::ClosedMidFrame { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
