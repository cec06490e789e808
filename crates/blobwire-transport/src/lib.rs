//! Blocking TCP transport for blobwire.
//!
//! This is the lowest layer: it resolves `host:port`, opens a stream with an
//! optional connect timeout, and hands out a [`TransportStream`] that the
//! framing layer reads from and writes to. [`TcpServer`] exists so stub peers
//! (tests, the CLI `echo` command) can accept connections with the same types.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{connect, TcpServer};
pub use traits::TransportStream;
