use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use blobwire_transport::TransportStream;
use bytes::Bytes;
use tracing::trace;

use crate::codec::{parse_header, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::message::{decode_message, Message};

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// With `read_timeout` configured, the whole frame (prefix and body) must
/// arrive within that window.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    arm: Option<ArmTimeout<T>>,
}

/// Narrows a stream's own blocking timeout to what is left of the frame
/// deadline before each read or write.
pub(crate) type ArmTimeout<T> = fn(&T, Duration) -> Result<()>;

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            arm: None,
        }
    }

    /// Read the next complete frame body (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached before
    /// the prefix or the declared body is complete.
    pub fn read_payload(&mut self) -> Result<Bytes> {
        let deadline = self.config.read_timeout.map(Deadline::starting_now);

        let mut header = [0u8; HEADER_SIZE];
        read_exact(&mut self.inner, &mut header, deadline.as_ref(), self.arm)?;

        let payload_len = parse_header(header);
        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }

        let mut body = vec![0u8; payload_len];
        read_exact(&mut self.inner, &mut body, deadline.as_ref(), self.arm).map_err(|err| match err {
            FrameError::ConnectionClosed { expected, received } => FrameError::ConnectionClosed {
                expected: HEADER_SIZE + expected,
                received: HEADER_SIZE + received,
            },
            other => other,
        })?;

        trace!(len = payload_len, "frame received");
        Ok(Bytes::from(body))
    }

    /// Read the next frame and decode its body as a [`Message`].
    pub fn read_message(&mut self) -> Result<Message> {
        let body = self.read_payload()?;
        decode_message(&body)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<TransportStream> {
    /// Create a frame reader for `TransportStream` and apply read timeout from config.
    ///
    /// Before every read the socket timeout is narrowed to what is left of
    /// the frame deadline, so a peer that stalls mid-frame cannot stretch the
    /// wait past `read_timeout`.
    pub fn with_config_stream(inner: TransportStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        let mut reader = Self::with_config(inner, config);
        reader.arm = Some(arm_read_timeout as ArmTimeout<TransportStream>);
        Ok(reader)
    }
}

fn arm_read_timeout(stream: &TransportStream, remaining: Duration) -> Result<()> {
    stream
        .set_read_timeout(Some(remaining))
        .map_err(transport_to_frame_error)
}

pub(crate) struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    pub(crate) fn starting_now(limit: Duration) -> Self {
        Self {
            limit,
            at: Instant::now() + limit,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if Instant::now() >= self.at {
            return Err(FrameError::Timeout(self.limit));
        }
        Ok(())
    }

    pub(crate) fn limit(&self) -> Duration {
        self.limit
    }

    /// Time left before the deadline, never zero while `check` passes.
    pub(crate) fn remaining(&self) -> Duration {
        self.at
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1))
    }
}

pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Fill `buf` completely, looping over short reads.
fn read_exact<R: Read>(
    inner: &mut R,
    buf: &mut [u8],
    deadline: Option<&Deadline>,
    arm: Option<ArmTimeout<R>>,
) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        if let Some(deadline) = deadline {
            deadline.check()?;
            if let Some(arm) = arm {
                arm(inner, deadline.remaining())?;
            }
        }

        match inner.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(FrameError::ConnectionClosed {
                    expected: buf.len(),
                    received: filled,
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) && deadline.is_some() => {
                let limit = deadline.map(Deadline::limit).unwrap_or_default();
                return Err(FrameError::Timeout(limit));
            }
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

pub(crate) fn transport_to_frame_error(err: blobwire_transport::TransportError) -> FrameError {
    match err {
        blobwire_transport::TransportError::Io(io)
        | blobwire_transport::TransportError::Accept(io) => FrameError::Io(io),
        blobwire_transport::TransportError::Bind { source, .. }
        | blobwire_transport::TransportError::Connect { source, .. }
        | blobwire_transport::TransportError::Resolve { source, .. } => FrameError::Io(source),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Cursor, Write};
    use std::thread;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::message::encode_message;
    use crate::writer::FrameWriter;

    fn wire_for(payload: &[u8]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_frame(payload, &mut wire).unwrap();
        wire.to_vec()
    }

    /// What the source does on its next `read` call.
    enum Step {
        /// Hand out at most this many bytes.
        Chunk(usize),
        Fail(ErrorKind),
        Pause(Duration),
    }

    /// A `Read` source that serves `bytes` following a script. Once the
    /// script runs out, every read hands out `tail_chunk` bytes.
    struct ScriptedSource {
        bytes: Vec<u8>,
        pos: usize,
        script: VecDeque<Step>,
        tail_chunk: usize,
    }

    impl ScriptedSource {
        fn new(bytes: Vec<u8>, steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                bytes,
                pos: 0,
                script: steps.into_iter().collect(),
                tail_chunk: usize::MAX,
            }
        }

        fn byte_at_a_time(bytes: Vec<u8>) -> Self {
            Self {
                tail_chunk: 1,
                ..Self::new(bytes, std::iter::empty())
            }
        }

        fn serve(&mut self, limit: usize, buf: &mut [u8]) -> usize {
            let n = limit.min(buf.len()).min(self.bytes.len() - self.pos);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            n
        }
    }

    impl Read for ScriptedSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.script.pop_front() {
                Some(Step::Chunk(limit)) => Ok(self.serve(limit, buf)),
                Some(Step::Fail(kind)) => Err(kind.into()),
                Some(Step::Pause(delay)) => {
                    thread::sleep(delay);
                    let tail = self.tail_chunk;
                    Ok(self.serve(tail, buf))
                }
                None => {
                    let tail = self.tail_chunk;
                    Ok(self.serve(tail, buf))
                }
            }
        }
    }

    #[test]
    fn frames_are_read_back_to_back() {
        let big = vec![0xAB; 64 * 1024];
        let mut wire = wire_for(b"first");
        wire.extend(wire_for(b""));
        wire.extend(wire_for(&big));

        let mut reader = FrameReader::new(Cursor::new(wire));

        assert_eq!(reader.read_payload().unwrap().as_ref(), b"first");
        assert!(reader.read_payload().unwrap().is_empty());
        assert_eq!(reader.read_payload().unwrap().as_ref(), big.as_slice());
    }

    #[test]
    fn message_survives_one_byte_reads() {
        let message = Message::new(r#"{"op":"ping"}"#)
            .with_blob(vec![9u8; 40])
            .with_blob(Vec::new());
        let source = ScriptedSource::byte_at_a_time(wire_for(&encode_message(&message)));
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_message().unwrap(), message);
    }

    #[test]
    fn prefix_split_across_reads() {
        let source = ScriptedSource::new(
            wire_for(b"split"),
            [Step::Chunk(1), Step::Chunk(2), Step::Chunk(3)],
        );
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_payload().unwrap().as_ref(), b"split");
    }

    #[test]
    fn eof_reports_how_far_the_frame_got() {
        let mut prefix_only = BytesMut::new();
        prefix_only.put_u32(16);
        let mut mid_body = prefix_only.clone();
        mid_body.put_slice(b"only");

        let cases: [(Vec<u8>, usize, usize); 4] = [
            (Vec::new(), 4, 0),
            (vec![0x00, 0x00], 4, 2),
            (prefix_only.to_vec(), 20, 4),
            (mid_body.to_vec(), 20, 8),
        ];

        for (wire, want_expected, want_received) in cases {
            let mut reader = FrameReader::new(Cursor::new(wire));
            match reader.read_payload().unwrap_err() {
                FrameError::ConnectionClosed { expected, received } => {
                    assert_eq!((expected, received), (want_expected, want_received));
                }
                other => panic!("expected ConnectionClosed, got {other:?}"),
            }
        }
    }

    #[test]
    fn undecodable_body_is_decode_error() {
        let mut reader = FrameReader::new(Cursor::new(wire_for(&[0x0F, 0x00])));
        assert!(reader.read_message().unwrap_err().is_decode());
    }

    #[test]
    fn declared_length_over_limit_is_rejected() {
        let mut wire = BytesMut::new();
        wire.put_u32(1024);

        let config = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), config);
        let err = reader.read_payload().unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 1024,
                max: 16
            }
        ));

        reader.set_max_payload_size(2048);
        assert_eq!(reader.config().max_payload_size, 2048);
    }

    #[test]
    fn interrupted_read_is_retried() {
        let source = ScriptedSource::new(
            wire_for(b"ok"),
            [Step::Chunk(2), Step::Fail(ErrorKind::Interrupted)],
        );
        let mut reader = FrameReader::new(source);

        assert_eq!(reader.read_payload().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn would_block_is_timeout_only_with_deadline() {
        let source = ScriptedSource::new(wire_for(b"ok"), [Step::Fail(ErrorKind::WouldBlock)]);
        let mut reader = FrameReader::new(source);
        assert!(matches!(
            reader.read_payload().unwrap_err(),
            FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock
        ));

        let source = ScriptedSource::new(wire_for(b"ok"), [Step::Fail(ErrorKind::WouldBlock)]);
        let config = FrameConfig {
            read_timeout: Some(Duration::from_secs(5)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(source, config);
        assert!(matches!(
            reader.read_payload().unwrap_err(),
            FrameError::Timeout(limit) if limit == Duration::from_secs(5)
        ));
    }

    #[test]
    fn trickling_peer_hits_frame_deadline() {
        let pauses = (0..40).map(|_| Step::Pause(Duration::from_millis(5)));
        let mut source = ScriptedSource::new(wire_for(&[1u8; 64]), pauses);
        source.tail_chunk = 1;
        let config = FrameConfig {
            read_timeout: Some(Duration::from_millis(40)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(source, config);

        assert!(matches!(
            reader.read_payload().unwrap_err(),
            FrameError::Timeout(_)
        ));
    }

    #[test]
    fn frame_crosses_loopback_socket() {
        let server = blobwire_transport::TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let sender = thread::spawn(move || {
            let stream = blobwire_transport::connect("127.0.0.1", port, None).unwrap();
            let mut writer = FrameWriter::new(stream);
            writer.write_message(&Message::new("ping").with_blob("blob")).unwrap();
        });

        let mut reader = FrameReader::new(server.accept().unwrap());
        let message = reader.read_message().unwrap();
        assert_eq!(message.text().as_ref(), b"ping");
        assert_eq!(message.blobs(), &[Bytes::from("blob")]);

        sender.join().unwrap();
    }

    #[test]
    fn peer_stalling_mid_prefix_is_bounded_by_frame_deadline() {
        let server = blobwire_transport::TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let stalling_peer = thread::spawn(move || {
            let mut accepted = server.accept().unwrap();
            thread::sleep(Duration::from_millis(180));
            accepted.write_all(&[0x00, 0x00]).unwrap();
            thread::sleep(Duration::from_millis(600));
        });

        let stream = blobwire_transport::connect("127.0.0.1", port, None).unwrap();
        let limit = Duration::from_millis(200);
        let config = FrameConfig {
            read_timeout: Some(limit),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_stream(stream, config).unwrap();

        let started = Instant::now();
        let err = reader.read_payload().unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, FrameError::Timeout(d) if d == limit), "got {err:?}");
        assert!(elapsed < limit + Duration::from_millis(100), "took {elapsed:?}");

        stalling_peer.join().unwrap();
    }

    #[test]
    fn remaining_never_reaches_zero() {
        let deadline = Deadline::starting_now(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert!(deadline.check().is_err());
        assert_eq!(deadline.remaining(), Duration::from_millis(1));
    }

    #[test]
    fn silent_socket_peer_is_timeout() {
        let server = blobwire_transport::TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let silent_peer = thread::spawn(move || {
            let accepted = server.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(accepted);
        });

        let stream = blobwire_transport::connect("127.0.0.1", port, None).unwrap();
        let config = FrameConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_stream(stream, config).unwrap();
        assert!(matches!(
            reader.read_payload().unwrap_err(),
            FrameError::Timeout(_)
        ));

        silent_peer.join().unwrap();
    }
}
