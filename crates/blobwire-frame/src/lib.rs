//! Length-prefixed message framing for text + blob queries.
//!
//! Every request and response travels as one frame:
//! - A 4-byte big-endian payload length
//! - Exactly that many bytes of encoded [`Message`] body
//!
//! [`FrameReader`] and [`FrameWriter`] own the partial-I/O loops, so callers
//! only ever see complete frames or a typed error.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, parse_header, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{decode_message, encode_message, encoded_len, Message};
pub use reader::FrameReader;
pub use writer::FrameWriter;
