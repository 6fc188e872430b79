// SPDX-License-Identifier: Apache-2.0
//! config
//!
//! Layer: Crate root
//! Purpose:
//! - connection options for the engine (addressing, socket tuning, staging)

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 10086;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WcfOptions {
    pub host: String,
    /// Command channel port; the event channel listens on `port + 1`.
    pub port: u16,
    pub socket: SocketOptions,
    /// Staging directory for downloaded/inline send payloads.
    pub cache_dir: PathBuf,
    /// Include moments-feed events when message receiving is enabled.
    pub recv_pyq: bool,
}

impl Default for WcfOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            socket: SocketOptions::default(),
            cache_dir: std::env::temp_dir().join("wcferry"),
            recv_pyq: false,
        }
    }
}

impl WcfOptions {
    pub fn command_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn event_addr(&self) -> String {
        format!("{}:{}", self.host, u32::from(self.port) + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    pub connect_timeout_ms: u64,
    /// Unset means wait forever, like the host's own sockets.
    pub send_timeout_ms: Option<u64>,
    pub recv_timeout_ms: Option<u64>,
    pub max_frame_size: usize,
    /// Pause between event channel dial attempts.
    pub redial_interval_ms: u64,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            send_timeout_ms: None,
            recv_timeout_ms: None,
            max_frame_size: 64 * 1024 * 1024,
            redial_interval_ms: 100,
        }
    }
}

impl SocketOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }

    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }

    pub fn redial_interval(&self) -> Duration {
        Duration::from_millis(self.redial_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_channel_sits_one_port_above() {
        let opts = WcfOptions::default();
        assert_eq!(opts.command_addr(), "127.0.0.1:10086");
        assert_eq!(opts.event_addr(), "127.0.0.1:10087");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let opts: WcfOptions = serde_json::from_str(r#"{"port": 20000, "recv_pyq": true}"#).unwrap();
        assert_eq!(opts.port, 20000);
        assert!(opts.recv_pyq);
        assert_eq!(opts.host, DEFAULT_HOST);
        assert_eq!(opts.socket, SocketOptions::default());
    }
}
