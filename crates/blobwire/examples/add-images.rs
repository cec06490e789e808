//! Upload every `img_NNNN.png` in a directory as one batch of `AddImage`
//! commands, one blob per image.
//!
//! Run with:
//!   cargo run --example add-images -- <video-name> [dir]

use std::fs;
use std::path::{Path, PathBuf};

use blobwire::client::{Client, ClientError};
use bytes::Bytes;
use serde_json::{json, Value};

fn is_frame_image(name: &str) -> bool {
    name.len() == "img_0000.png".len()
        && name.starts_with("img_")
        && name.ends_with(".png")
        && name.as_bytes()[4..8].iter().all(u8::is_ascii_digit)
}

fn frame_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_str().is_some_and(is_frame_image) {
            images.push(entry.path());
        }
    }
    images.sort();
    Ok(images)
}

fn add_image_command(file_name: &str, video: &str) -> Value {
    json!({
        "AddImage": {
            "properties": {
                "name": format!("Video Image: {file_name}"),
                "vidname": video,
                "length": "N/A",
            }
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let video = args.next().ok_or("usage: add-images <video-name> [dir]")?;
    let dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let mut commands = Vec::new();
    let mut blobs = Vec::new();
    for path in frame_images(&dir)? {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        commands.push(add_image_command(&file_name, &video));
        blobs.push(Bytes::from(fs::read(&path)?));
    }
    eprintln!("Uploading {} images from {}", blobs.len(), dir.display());

    let mut client = Client::new();
    client.connect_default()?;
    let response = client.query_json(&Value::Array(commands).to_string(), blobs)?;
    client.disconnect();

    let text = response
        .text_str()
        .map_err(|e| ClientError::ProtocolDecode(e.to_string()))?;
    println!("{text}");

    let entries: Vec<Value> = serde_json::from_str(text)?;
    for entry in &entries {
        if entry["AddImage"]["status"] != 0 {
            eprintln!("Error in response: {entry}");
        }
    }

    Ok(())
}
