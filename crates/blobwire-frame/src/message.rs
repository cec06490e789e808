//! The query message carried inside every frame body.
//!
//! A message is one text payload plus an ordered list of opaque blobs. On the
//! wire it is the protobuf record
//!
//! ```text
//! message queryMessage {
//!     bytes json = 1;
//!     repeated bytes blobs = 2;
//! }
//! ```
//!
//! Field 1 is `bytes` rather than `string` so non-UTF-8 text survives; the two
//! are wire-identical for UTF-8 content. Repeated elements are always emitted,
//! so empty blobs keep both their position and the blob count.

use bytes::Bytes;
use prost::Message as _;

use crate::error::Result;

#[derive(Clone, PartialEq, prost::Message)]
struct QueryMessage {
    #[prost(bytes = "bytes", tag = "1")]
    json: Bytes,
    #[prost(bytes = "bytes", repeated, tag = "2")]
    blobs: Vec<Bytes>,
}

/// One request or response: a text payload and its blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    text: Bytes,
    blobs: Vec<Bytes>,
}

impl Message {
    /// A message with `text` and no blobs.
    pub fn new(text: impl Into<Bytes>) -> Self {
        Self {
            text: text.into(),
            blobs: Vec::new(),
        }
    }

    pub fn from_parts(text: impl Into<Bytes>, blobs: Vec<Bytes>) -> Self {
        Self {
            text: text.into(),
            blobs,
        }
    }

    /// Append a blob after the existing ones.
    pub fn with_blob(mut self, blob: impl Into<Bytes>) -> Self {
        self.blobs.push(blob.into());
        self
    }

    pub fn push_blob(&mut self, blob: impl Into<Bytes>) {
        self.blobs.push(blob.into());
    }

    pub fn text(&self) -> &Bytes {
        &self.text
    }

    /// The text payload as UTF-8, if it is valid UTF-8.
    pub fn text_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.text)
    }

    pub fn blobs(&self) -> &[Bytes] {
        &self.blobs
    }

    pub fn into_parts(self) -> (Bytes, Vec<Bytes>) {
        (self.text, self.blobs)
    }
}

/// Serialize a message into one contiguous frame body.
pub fn encode_message(message: &Message) -> Bytes {
    let wire = QueryMessage {
        json: message.text.clone(),
        blobs: message.blobs.clone(),
    };
    Bytes::from(wire.encode_to_vec())
}

/// Size of the body [`encode_message`] would produce.
pub fn encoded_len(message: &Message) -> usize {
    QueryMessage {
        json: message.text.clone(),
        blobs: message.blobs.clone(),
    }
    .encoded_len()
}

/// Parse a frame body. Either the whole body parses or an error is returned.
pub fn decode_message(body: &[u8]) -> Result<Message> {
    let wire = QueryMessage::decode(body)?;
    Ok(Message {
        text: wire.json,
        blobs: wire.blobs,
    })
}
