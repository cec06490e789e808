//! Client for a length-prefixed text + blob query protocol.
//!
//! A query is one text payload (typically JSON) plus an ordered list of
//! binary blobs, sent as a single frame over TCP; the server answers with a
//! frame of the same shape.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connect/listen and the owned stream type
//! - [`frame`]: 4-byte big-endian length prefix framing and the [`Message`] body codec
//! - [`client`]: The blocking request/response [`Client`] (and `AsyncClient` behind `async`)

/// Re-export transport types.
pub mod transport {
    pub use blobwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use blobwire_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use blobwire_client::*;
}

pub use blobwire_client::{Client, ClientConfig, ClientError, ConnectionState};
pub use blobwire_frame::Message;
