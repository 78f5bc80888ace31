use std::path::PathBuf;

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device at the specified path.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the stream (EOF or zero-length write).
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
