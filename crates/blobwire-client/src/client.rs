use std::net::SocketAddr;

use blobwire_frame::{decode_message, encode_message, FrameReader, FrameWriter, Message};
use blobwire_transport::TransportStream;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Lifecycle of a [`Client`]'s connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. Initial state, and the state after `disconnect`.
    Disconnected,
    /// A live connection is ready for the next query.
    Connected,
    /// A send or receive failed; the stream has been released. Only
    /// `connect` or `disconnect` leave this state.
    Failed,
}

struct Connection {
    reader: FrameReader<TransportStream>,
    writer: FrameWriter<TransportStream>,
    peer: SocketAddr,
}

impl Connection {
    fn close(self) {
        // Shutdown reaches both cloned handles; the fds close on drop.
        if let Err(err) = self.writer.get_ref().shutdown() {
            trace!(peer = %self.peer, error = %err, "socket shutdown failed");
        }
    }
}

/// Blocking client for one framed request/response connection.
///
/// Requests are strictly serialized: `query` takes `&mut self`, so a client
/// can never have two requests in flight and frames can never interleave.
/// Share work across threads by giving each thread its own `Client`.
///
/// The socket is released on every exit path: `disconnect`, a failed query,
/// or dropping the client.
pub struct Client {
    config: ClientConfig,
    state: ConnectionState,
    conn: Option<Connection>,
}

impl Client {
    /// A disconnected client with default settings.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// A disconnected client with explicit settings.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            conn: None,
        }
    }

    /// Open a connection to `host:port`.
    ///
    /// Fails with [`ClientError::AlreadyConnected`] if a live connection
    /// exists. From `Failed`, the old stream is discarded first. On error the
    /// client is left `Disconnected`.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if let (ConnectionState::Connected, Some(conn)) = (self.state, self.conn.as_ref()) {
            return Err(ClientError::AlreadyConnected(conn.peer));
        }
        self.release();
        self.state = ConnectionState::Disconnected;

        let stream = blobwire_transport::connect(host, port, self.config.connect_timeout)?;
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;
        let peer = stream.peer_addr();

        let frame_config = self.config.frame_config();
        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;

        debug!(%peer, "client connected");
        self.conn = Some(Connection {
            reader,
            writer,
            peer,
        });
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Connect to the host and port from this client's config.
    pub fn connect_default(&mut self) -> Result<()> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.connect(&host, port)
    }

    /// Close the connection. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if self.release() {
            debug!("client disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Send one message and block until its response has fully arrived.
    ///
    /// The response is returned exactly as decoded; its text is not
    /// interpreted. Any transport or decode failure moves the client to
    /// `Failed` and releases the stream. An oversized request is rejected
    /// before anything is written and leaves the connection usable.
    pub fn query(&mut self, request: &Message) -> Result<Message> {
        let conn = match (self.state, self.conn.as_mut()) {
            (ConnectionState::Connected, Some(conn)) => conn,
            _ => return Err(ClientError::NotConnected),
        };

        let body = encode_message(request);
        let result = round_trip(conn, &body);

        if let Err(err) = &result {
            if err.is_fatal() {
                self.release();
                self.state = ConnectionState::Failed;
            }
        }
        result
    }

    /// [`Client::query`] with the message given as parts.
    pub fn query_parts(&mut self, text: impl Into<Bytes>, blobs: Vec<Bytes>) -> Result<Message> {
        self.query(&Message::from_parts(text, blobs))
    }

    /// Validate `json` and send it re-serialized with 4-space indentation.
    ///
    /// Key order is preserved. Invalid JSON fails with
    /// [`ClientError::InvalidJson`] without touching the connection.
    pub fn query_json(&mut self, json: &str, blobs: Vec<Bytes>) -> Result<Message> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let text = pretty_json(json)?;
        self.query(&Message::from_parts(text, blobs))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Remote address of the live connection.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.conn.as_ref().map(|conn| conn.peer)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn release(&mut self) -> bool {
        match self.conn.take() {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("peer", &self.peer_addr())
            .finish()
    }
}

fn round_trip(conn: &mut Connection, body: &[u8]) -> Result<Message> {
    conn.writer.send(body)?;
    let response = conn
        .reader
        .read_payload()
        .map_err(ClientError::from_response)?;
    let message = decode_message(&response).map_err(ClientError::from_response)?;
    debug!(
        sent = body.len(),
        received = response.len(),
        blobs = message.blobs().len(),
        "query completed"
    );
    Ok(message)
}

pub(crate) fn pretty_json(json: &str) -> Result<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let mut out = Vec::with_capacity(json.len() * 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
