use std::io::{ErrorKind, Write};
use std::time::Duration;

use blobwire_transport::TransportStream;
use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::{encode_message, Message};
use crate::reader::{is_timeout, transport_to_frame_error, ArmTimeout, Deadline};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// The prefix and body are staged in one buffer and written by a single
/// write-all loop, so a frame is never interleaved with anything else written
/// through this writer.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    arm: Option<ArmTimeout<T>>,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            arm: None,
        }
    }

    /// Encode a message and send it as one frame.
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        let body = encode_message(message);
        self.send(&body)
    }

    /// Frame and send a raw body.
    ///
    /// Size is checked before anything is written; a rejected payload leaves
    /// the stream untouched.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let deadline = self.config.write_timeout.map(Deadline::starting_now);
        let mut offset = 0usize;
        while offset < self.buf.len() {
            if let Some(deadline) = &deadline {
                deadline.check()?;
                if let Some(arm) = self.arm {
                    arm(&self.inner, deadline.remaining())?;
                }
            }
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => {
                    return Err(FrameError::ConnectionClosed {
                        expected: self.buf.len(),
                        received: offset,
                    })
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) && deadline.is_some() => {
                    let limit = deadline.as_ref().map(Deadline::limit).unwrap_or_default();
                    return Err(FrameError::Timeout(limit));
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        trace!(len = payload.len(), "frame sent");
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<TransportStream> {
    /// Create a frame writer for `TransportStream` and apply write timeout from config.
    ///
    /// Like the reader, each write is bounded by what is left of the frame
    /// deadline rather than the full `write_timeout`.
    pub fn with_config_stream(inner: TransportStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        let mut writer = Self::with_config(inner, config);
        writer.arm = Some(arm_write_timeout as ArmTimeout<TransportStream>);
        Ok(writer)
    }
}

fn arm_write_timeout(stream: &TransportStream, remaining: Duration) -> Result<()> {
    stream
        .set_write_timeout(Some(remaining))
        .map_err(transport_to_frame_error)
}
