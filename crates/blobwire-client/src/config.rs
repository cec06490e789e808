use std::time::Duration;

use blobwire_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};

/// Host used by [`crate::Client::connect_default`].
pub const DEFAULT_HOST: &str = "localhost";
/// Port used by [`crate::Client::connect_default`].
pub const DEFAULT_PORT: u16 = 55555;

/// Client connection and framing settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Bound on each TCP connect attempt. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Deadline for receiving one whole response frame.
    pub read_timeout: Option<Duration>,
    /// Deadline for sending one whole request frame.
    pub write_timeout: Option<Duration>,
    /// Largest frame body sent or accepted. Default: 256 MiB.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: Some(Duration::from_secs(60)),
            write_timeout: Some(Duration::from_secs(60)),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    /// Default settings aimed at `host:port`.
    pub fn with_address(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Framing settings derived from this config.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}
