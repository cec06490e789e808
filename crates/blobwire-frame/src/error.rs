use std::time::Duration;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// The frame deadline elapsed before the transfer completed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The frame body is not a well-formed message.
    #[error("malformed message body: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl FrameError {
    /// Whether this error came from the frame body rather than the stream.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
