use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::TransportStream;

/// Connect to `host:port` (blocking).
///
/// Every resolved address is tried in order; the error from the last attempt
/// is returned if none accepts. With `timeout` set, each attempt is bounded by
/// it, otherwise the OS default connect timeout applies.
pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<TransportStream> {
    let addr = format!("{host}:{port}");
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.clone(),
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(TransportError::Resolve {
            addr,
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ),
        });
    }

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout.filter(|t| !t.is_zero()) {
            Some(limit) => TcpStream::connect_timeout(&candidate, limit),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                debug!(%candidate, "connected");
                return Ok(TransportStream::from_tcp(stream, candidate));
            }
            Err(err) => {
                debug!(%candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        addr,
        source: last_err
            .unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
    })
}

/// Listening TCP socket for stub peers.
///
/// Accepted connections come back as [`TransportStream`] so the same framing
/// halves work on both ends.
pub struct TcpServer {
    listener: TcpListener,
    local: SocketAddr,
}

impl TcpServer {
    /// Bind and listen on `addr`. Port 0 picks a free port; see [`TcpServer::local_addr`].
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let display = addr.to_string();
        let listener = TcpListener::bind(&addr).map_err(|source| TransportError::Bind {
            addr: display.clone(),
            source,
        })?;
        let local = listener
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: display,
                source,
            })?;

        info!(%local, "listening on tcp");

        Ok(Self { listener, local })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TransportStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(TransportStream::from_tcp(stream, peer))
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_bind_accept_connect() {
        let server = TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let handle = std::thread::spawn(move || {
            let mut client = connect("127.0.0.1", port, Some(Duration::from_secs(2))).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut accepted = server.accept().unwrap();
        let mut buf = [0u8; 5];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop so the port is very likely closed.
        let port = {
            let server = TcpServer::bind("127.0.0.1:0").unwrap();
            server.local_addr().port()
        };

        let result = connect("127.0.0.1", port, Some(Duration::from_millis(500)));
        match result {
            Err(TransportError::Connect { addr, .. }) => {
                assert_eq!(addr, format!("127.0.0.1:{port}"));
            }
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_failure() {
        let result = connect("definitely-not-a-host.invalid", 55555, None);
        assert!(matches!(
            result,
            Err(TransportError::Resolve { .. }) | Err(TransportError::Connect { .. })
        ));
    }

    #[test]
    fn test_bind_conflict_reports_address() {
        let first = TcpServer::bind("127.0.0.1:0").unwrap();
        let taken = first.local_addr();

        let result = TcpServer::bind(taken);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_stream_clone_shares_socket() {
        let server = TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let handle = std::thread::spawn(move || {
            let mut accepted = server.accept().unwrap();
            let mut buf = [0u8; 4];
            accepted.read_exact(&mut buf).unwrap();
            accepted.write_all(&buf).unwrap();
        });

        let writer = connect("127.0.0.1", port, None).unwrap();
        let mut reader = writer.try_clone().unwrap();
        assert_eq!(reader.peer_addr(), writer.peer_addr());

        let mut writer = writer;
        writer.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        handle.join().unwrap();
    }

    #[test]
    fn test_shutdown_unblocks_peer_with_eof() {
        let server = TcpServer::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().port();

        let handle = std::thread::spawn(move || {
            let mut accepted = server.accept().unwrap();
            let mut buf = Vec::new();
            accepted.read_to_end(&mut buf).unwrap();
            buf
        });

        let stream = connect("127.0.0.1", port, None).unwrap();
        stream.shutdown().unwrap();
        // A second shutdown on an already shut down socket is tolerated.
        let _ = stream.shutdown();

        assert!(handle.join().unwrap().is_empty());
    }
}
