use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blobwire_frame::{decode_message, FrameConfig, FrameError, FrameReader, FrameWriter};
use blobwire_transport::{TcpServer, TransportStream};

use crate::cmd::EchoArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_listening, OutputFormat};

enum RecvDisposition {
    /// Peer closed between frames.
    Closed,
    /// Connection is unusable; log and move on to the next one.
    Drop(String),
}

pub fn run(args: EchoArgs, format: OutputFormat) -> CliResult<i32> {
    let server = TcpServer::bind(format!("{}:{}", args.host, args.port))
        .map_err(|err| transport_error("bind failed", err))?;
    print_listening(server.local_addr(), server.transport_name(), format);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut served = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.connections.is_some_and(|limit| served >= limit) {
            break;
        }

        let stream = server
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        served += 1;
        let peer = stream.peer_addr();

        match serve_connection(stream, &running) {
            Ok(frames) => tracing::info!(%peer, frames, "connection closed"),
            Err(RecvDisposition::Drop(reason)) => {
                tracing::warn!(%peer, reason = %reason, "dropping connection");
            }
            Err(RecvDisposition::Closed) => tracing::info!(%peer, "connection closed"),
        }
    }

    Ok(SUCCESS)
}

fn serve_connection(
    stream: TransportStream,
    running: &AtomicBool,
) -> Result<usize, RecvDisposition> {
    let config = FrameConfig::default();
    let writer_stream = stream
        .try_clone()
        .map_err(|err| RecvDisposition::Drop(err.to_string()))?;
    let mut reader = FrameReader::with_config_stream(stream, config.clone())
        .map_err(|err| RecvDisposition::Drop(err.to_string()))?;
    let mut writer = FrameWriter::with_config_stream(writer_stream, config)
        .map_err(|err| RecvDisposition::Drop(err.to_string()))?;

    let mut frames = 0usize;
    while running.load(Ordering::SeqCst) {
        let body = match reader.read_payload() {
            Ok(body) => body,
            Err(err) => match classify_recv_error(err) {
                RecvDisposition::Closed => break,
                other => return Err(other),
            },
        };

        match decode_message(&body) {
            Ok(message) => tracing::info!(
                size = body.len(),
                text_size = message.text().len(),
                blobs = message.blobs().len(),
                blob_bytes = message.blobs().iter().map(|b| b.len()).sum::<usize>(),
                "echoing message"
            ),
            Err(err) => tracing::warn!(
                size = body.len(),
                error = %err,
                "echoing undecodable body"
            ),
        }

        writer
            .send(&body)
            .map_err(|err| RecvDisposition::Drop(frame_error("echo send failed", err).message))?;
        frames += 1;
    }

    Ok(frames)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn classify_recv_error(err: FrameError) -> RecvDisposition {
    match err {
        FrameError::ConnectionClosed { received: 0, .. } => RecvDisposition::Closed,
        other => RecvDisposition::Drop(frame_error("receive failed", other).message),
    }
}
