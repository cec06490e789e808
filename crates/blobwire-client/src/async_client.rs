//! Tokio counterpart of [`crate::Client`] with the same state machine and
//! error mapping.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use blobwire_frame::{decode_message, encode_message, FrameCodec, FrameError, Message, HEADER_SIZE};
use blobwire_transport::TransportError;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::client::{pretty_json, ConnectionState};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

struct AsyncConnection {
    framed: Framed<TcpStream, FrameCodec>,
    peer: SocketAddr,
}

/// Async client for one framed request/response connection.
///
/// `query` takes `&mut self` and is not cancel-safe: dropping its future
/// mid-frame leaves the stream misaligned, so the next call should be
/// preceded by `disconnect` and `connect`.
pub struct AsyncClient {
    config: ClientConfig,
    state: ConnectionState,
    conn: Option<AsyncConnection>,
}

impl AsyncClient {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            conn: None,
        }
    }

    /// Open a connection to `host:port`.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if let (ConnectionState::Connected, Some(conn)) = (self.state, self.conn.as_ref()) {
            return Err(ClientError::AlreadyConnected(conn.peer));
        }
        self.conn = None;
        self.state = ConnectionState::Disconnected;

        let addr = format!("{host}:{port}");
        let attempt = TcpStream::connect((host, port));
        let connected = match self.config.connect_timeout.filter(|t| !t.is_zero()) {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {limit:?}"),
                )),
            },
            None => attempt.await,
        };
        let stream = connected.map_err(|source| TransportError::Connect { addr, source })?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;
        let peer = stream.peer_addr().map_err(TransportError::Io)?;

        debug!(%peer, "async client connected");
        self.conn = Some(AsyncConnection {
            framed: Framed::new(stream, FrameCodec::new(self.config.max_payload_size)),
            peer,
        });
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Close the connection. Safe to call in any state.
    pub fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            debug!("async client disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Send one message and wait until its response has fully arrived.
    pub async fn query(&mut self, request: &Message) -> Result<Message> {
        let conn = match (self.state, self.conn.as_mut()) {
            (ConnectionState::Connected, Some(conn)) => conn,
            _ => return Err(ClientError::NotConnected),
        };

        let result = round_trip(
            conn,
            encode_message(request),
            self.config.write_timeout,
            self.config.read_timeout,
        )
        .await;

        if let Err(err) = &result {
            if err.is_fatal() {
                self.conn = None;
                self.state = ConnectionState::Failed;
            }
        }
        result
    }

    /// Async [`crate::Client::query_json`].
    pub async fn query_json(&mut self, json: &str, blobs: Vec<Bytes>) -> Result<Message> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let text = pretty_json(json)?;
        self.query(&Message::from_parts(text, blobs)).await
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.conn.as_ref().map(|conn| conn.peer)
    }
}

impl Default for AsyncClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn round_trip(
    conn: &mut AsyncConnection,
    body: Bytes,
    write_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
) -> Result<Message> {
    let sent = body.len();
    within(write_timeout, conn.framed.send(body))
        .await?
        .map_err(ClientError::from)?;

    let response = match within(read_timeout, conn.framed.next()).await? {
        Some(frame) => frame.map_err(ClientError::from_response)?,
        None => {
            return Err(ClientError::ConnectionClosed {
                expected: HEADER_SIZE,
                received: 0,
            })
        }
    };

    let message = decode_message(&response).map_err(ClientError::from_response)?;
    debug!(
        sent,
        received = response.len(),
        blobs = message.blobs().len(),
        "async query completed"
    );
    Ok(message)
}

async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output> {
    match limit.filter(|t| !t.is_zero()) {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ClientError::from(FrameError::Timeout(limit))),
        None => Ok(fut.await),
    }
}
