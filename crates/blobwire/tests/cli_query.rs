#![cfg(feature = "cli")]

use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "blobwire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port should be available")
        .port()
}

fn wait_for_connect(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

struct EchoServer {
    child: Child,
    port: u16,
}

impl EchoServer {
    fn start() -> Self {
        let port = free_port();
        let child = Command::new(env!("CARGO_BIN_EXE_blobwire"))
            .arg("--log-level")
            .arg("error")
            .arg("echo")
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("echo command should start");
        wait_for_connect(port, Duration::from_secs(3));
        Self { child, port }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn query_against_echo_returns_text_and_blobs() {
    let server = EchoServer::start();
    let dir = unique_temp_dir("query");
    let blob = dir.join("input.bin");
    std::fs::write(&blob, [0u8, 1, 2, 3, 255]).expect("blob should be writable");
    let out_dir = dir.join("out");

    let output = Command::new(env!("CARGO_BIN_EXE_blobwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("query")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(server.port.to_string())
        .arg("--json")
        .arg(r#"{"op":"ping","n":1}"#)
        .arg("--blob")
        .arg(&blob)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--timeout")
        .arg("5s")
        .output()
        .expect("query should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be json");
    assert_eq!(value["text"]["op"], "ping");
    assert_eq!(value["text"]["n"], 1);
    assert_eq!(value["blob_count"], 1);
    assert_eq!(value["blobs"][0]["size"], 5);

    let saved = std::fs::read(out_dir.join("blob_0000.bin")).expect("blob should be saved");
    assert_eq!(saved, vec![0u8, 1, 2, 3, 255]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn raw_data_is_echoed_verbatim() {
    let server = EchoServer::start();

    let output = Command::new(env!("CARGO_BIN_EXE_blobwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("raw")
        .arg("query")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(server.port.to_string())
        .arg("--data")
        .arg("not json at all")
        .output()
        .expect("query should run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"not json at all");
}

#[test]
fn invalid_json_returns_60() {
    let server = EchoServer::start();

    let output = Command::new(env!("CARGO_BIN_EXE_blobwire"))
        .arg("query")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(server.port.to_string())
        .arg("--json")
        .arg("{not json")
        .output()
        .expect("query should run");

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("query failed"));
}

#[test]
fn refused_connect_returns_3() {
    let port = free_port();

    let output = Command::new(env!("CARGO_BIN_EXE_blobwire"))
        .arg("query")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .arg("--data")
        .arg("x")
        .arg("--connect-timeout")
        .arg("1s")
        .output()
        .expect("query should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_blobwire"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("blobwire {}", env!("CARGO_PKG_VERSION")));
}
