//! Request/response client for length-prefixed text + blob queries.
//!
//! A [`Client`] owns one TCP connection and carries strictly alternating
//! request and response frames over it: send one [`Message`], block until the
//! whole response frame has arrived, return it. There is no pipelining and no
//! retry; every failure is handed back to the caller as a [`ClientError`].
//!
//! ```no_run
//! use blobwire_client::{Client, Message};
//!
//! # fn main() -> blobwire_client::Result<()> {
//! let mut client = Client::new();
//! client.connect("localhost", 55555)?;
//! let response = client.query(&Message::new(r#"[{"FindImage":{}}]"#))?;
//! println!("{} blobs returned", response.blobs().len());
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;

#[cfg(feature = "async")]
pub mod async_client;

#[cfg(feature = "async")]
pub use async_client::AsyncClient;
pub use blobwire_frame::Message;
pub use client::{Client, ConnectionState};
pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ClientError, Result};
