use std::fs;
use std::path::{Path, PathBuf};

use blobwire_client::{Client, ClientConfig, Message};
use bytes::Bytes;

use crate::cmd::{parse_duration, QueryArgs};
use crate::exit::{client_error, io_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub fn run(args: QueryArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let blobs = read_blobs(&args.blobs)?;

    let config = ClientConfig {
        connect_timeout: Some(connect_timeout),
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..ClientConfig::with_address(args.host.clone(), args.port)
    };
    let mut client = Client::with_config(config);
    client
        .connect(&args.host, args.port)
        .map_err(|err| client_error("connect failed", err))?;
    let peer = client
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| format!("{}:{}", args.host, args.port));

    tracing::debug!(%peer, blobs = blobs.len(), "sending query");
    let response = match (&args.json, &args.data, &args.file) {
        (Some(json), _, _) => client.query_json(json, blobs),
        (_, Some(data), _) => client.query(&Message::from_parts(data.clone(), blobs)),
        (_, _, Some(path)) => {
            let text = fs::read(path)
                .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
            client.query(&Message::from_parts(text, blobs))
        }
        (None, None, None) => client.query(&Message::from_parts(Bytes::new(), blobs)),
    }
    .map_err(|err| client_error("query failed", err))?;
    client.disconnect();

    let saved = match &args.out_dir {
        Some(dir) => save_blobs(dir, &response)?,
        None => Vec::new(),
    };

    print_response(&response, &peer, &saved, format);
    Ok(SUCCESS)
}

fn read_blobs(paths: &[PathBuf]) -> CliResult<Vec<Bytes>> {
    paths
        .iter()
        .map(|path| {
            fs::read(path)
                .map(Bytes::from)
                .map_err(|err| io_error(&format!("read blob {}", path.display()), err))
        })
        .collect()
}

fn blob_file_name(index: usize) -> String {
    format!("blob_{index:04}.bin")
}

fn save_blobs(dir: &Path, response: &Message) -> CliResult<Vec<String>> {
    fs::create_dir_all(dir).map_err(|err| io_error(&format!("create {}", dir.display()), err))?;

    let mut saved = Vec::with_capacity(response.blobs().len());
    for (index, blob) in response.blobs().iter().enumerate() {
        let path = dir.join(blob_file_name(index));
        fs::write(&path, blob)
            .map_err(|err| io_error(&format!("write {}", path.display()), err))?;
        saved.push(path.display().to_string());
    }
    Ok(saved)
}
