//! Minimal echo server: accepts one peer and echoes every frame back.
//!
//! Run with:
//!   cargo run --example echo-server -- 55555
//!
//! In another terminal:
//!   cargo run --features cli -- query --port 55555 \
//!     --json '{"hello":"world"}' --blob Cargo.toml

use blobwire::frame::{decode_message, FrameError, FrameReader, FrameWriter};
use blobwire::transport::TcpServer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => blobwire::client::DEFAULT_PORT,
    };

    let server = TcpServer::bind(format!("127.0.0.1:{port}"))?;
    eprintln!("Listening on {}", server.local_addr());

    // Accept one peer and echo messages until disconnect.
    let stream = server.accept()?;
    eprintln!("Peer connected: {}", stream.peer_addr());

    let mut writer = FrameWriter::new(stream.try_clone()?);
    let mut reader = FrameReader::new(stream);

    loop {
        match reader.read_payload() {
            Ok(body) => {
                let message = decode_message(&body)?;
                eprintln!(
                    "Received {} bytes: {} text bytes, {} blobs",
                    body.len(),
                    message.text().len(),
                    message.blobs().len()
                );
                writer.send(&body)?;
            }
            Err(FrameError::ConnectionClosed { received: 0, .. }) => {
                eprintln!("Peer disconnected");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
