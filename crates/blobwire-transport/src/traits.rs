use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected TCP byte stream. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations. It owns
/// one TCP socket; [`TransportStream::try_clone`] hands out a second handle to
/// the same socket so reads and writes can live in separate framing halves.
pub struct TransportStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl Read for TransportStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TransportStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl TransportStream {
    pub(crate) fn from_tcp(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            inner: stream,
            peer,
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of this end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }

    /// Set read timeout on the underlying stream.
    ///
    /// `Some(Duration::ZERO)` is treated as "no timeout" rather than rejected.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout.filter(|t| !t.is_zero()))
            .map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .set_write_timeout(timeout.filter(|t| !t.is_zero()))
            .map_err(Into::into)
    }

    /// Disable Nagle's algorithm. Request frames are written in one buffer, so
    /// coalescing only adds latency.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned, self.peer))
    }

    /// Shut down both directions of the socket.
    ///
    /// Affects every clone of this stream. `NotConnected` (peer already gone)
    /// is not an error here.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for TransportStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportStream")
            .field("type", &"tcp")
            .field("peer", &self.peer)
            .finish()
    }
}
