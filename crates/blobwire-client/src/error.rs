use std::net::SocketAddr;
use std::time::Duration;

use blobwire_frame::FrameError;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connect attempt failed (unresolvable, refused, unreachable, timed out).
    #[error("connection failed: {0}")]
    Connection(#[from] blobwire_transport::TransportError),

    /// `connect` was called on a client that already holds a live connection.
    #[error("already connected to {0}")]
    AlreadyConnected(SocketAddr),

    /// A query was attempted without a live connection.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the stream before a complete frame was transferred.
    #[error("connection closed by peer after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    /// The response frame could not be decoded, or declared an impossible length.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The frame deadline elapsed while sending or receiving.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The encoded request exceeds the configured maximum.
    #[error("request too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The text handed to `query_json` is not valid JSON.
    #[error("invalid json query: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Any other I/O error on the established stream.
    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl ClientError {
    /// Whether this error left the client in the `Failed` state.
    ///
    /// After a fatal error the stream's byte alignment can no longer be
    /// trusted; the caller has to reconnect before issuing another query.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed { .. } | Self::ProtocolDecode(_) | Self::Timeout(_) | Self::Io(_)
        )
    }

    /// Map a frame error seen while reading a response.
    ///
    /// An oversized declared length on the way in is a protocol violation by
    /// the peer, not a caller mistake.
    pub(crate) fn from_response(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { size, max } => Self::ProtocolDecode(format!(
                "declared response length {size} exceeds maximum {max}"
            )),
            other => other.into(),
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { size, max } => Self::PayloadTooLarge { size, max },
            FrameError::ConnectionClosed { expected, received } => {
                Self::ConnectionClosed { expected, received }
            }
            FrameError::Timeout(limit) => Self::Timeout(limit),
            FrameError::Decode(err) => Self::ProtocolDecode(err.to_string()),
            FrameError::Io(err) => Self::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
