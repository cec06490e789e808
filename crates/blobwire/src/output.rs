use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use blobwire_frame::Message;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct BlobOutput {
    index: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<String>,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    peer: &'a str,
    text_size: usize,
    /// Parsed JSON when the response text is JSON, otherwise the text itself.
    text: serde_json::Value,
    blob_count: usize,
    blobs: Vec<BlobOutput>,
    timestamp: String,
}

/// Print a query response. `saved` lists where each blob was written, if anywhere.
pub fn print_response(response: &Message, peer: &str, saved: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                peer,
                text_size: response.text().len(),
                text: text_value(response.text()),
                blob_count: response.blobs().len(),
                blobs: blob_rows(response, saved),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PART", "SIZE", "CONTENT"])
                .add_row(vec![
                    "text".to_string(),
                    response.text().len().to_string(),
                    text_preview(response.text()),
                ]);
            for blob in blob_rows(response, saved) {
                table.add_row(vec![
                    format!("blob {}", blob.index),
                    blob.size.to_string(),
                    blob.saved_to.unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("peer={peer} blobs={}", response.blobs().len());
            println!("{}", text_preview(response.text()));
            for blob in blob_rows(response, saved) {
                match blob.saved_to {
                    Some(path) => println!("blob[{}] {} bytes -> {path}", blob.index, blob.size),
                    None => println!("blob[{}] {} bytes", blob.index, blob.size),
                }
            }
        }
        OutputFormat::Raw => {
            print_raw(response.text());
        }
    }
}

#[derive(Serialize)]
struct ListeningOutput {
    listening: String,
    transport: &'static str,
}

/// Announce the address the echo peer is bound to.
pub fn print_listening(addr: SocketAddr, transport: &'static str, format: OutputFormat) {
    println!("{}", listening_line(addr, transport, format));
}

fn listening_line(addr: SocketAddr, transport: &'static str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(&ListeningOutput {
            listening: addr.to_string(),
            transport,
        })
        .unwrap_or_else(|_| "{}".to_string()),
        OutputFormat::Raw => addr.to_string(),
        OutputFormat::Table | OutputFormat::Pretty => {
            format!("listening on {addr} ({transport})")
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn blob_rows(response: &Message, saved: &[String]) -> Vec<BlobOutput> {
    response
        .blobs()
        .iter()
        .enumerate()
        .map(|(index, blob)| BlobOutput {
            index,
            size: blob.len(),
            saved_to: saved.get(index).cloned(),
        })
        .collect()
}

fn text_value(text: &[u8]) -> serde_json::Value {
    serde_json::from_slice(text).unwrap_or_else(|_| serde_json::Value::String(text_preview(text)))
}

fn text_preview(text: &[u8]) -> String {
    match std::str::from_utf8(text) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", text.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
