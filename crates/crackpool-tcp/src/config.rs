//! Configuration for the TCP transport task

use serde::{Deserialize, Serialize};

/// Default scheduler address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5555";

/// Configuration for the TCP transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Outbound frames buffered per connection before new ones are dropped
    pub write_queue_size: usize,
    /// Longest accepted inbound line, in bytes
    pub max_frame_len: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            write_queue_size: 64,
            max_frame_len: 64 * 1024,
        }
    }
}

impl TcpConfig {
    /// Listen on an ephemeral localhost port
    pub fn testing() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            ..Self::default()
        }
    }

    pub fn with_listen_addr(mut self, listen_addr: impl Into<String>) -> Self {
        self.listen_addr = listen_addr.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("TCP listen address must not be empty".to_string());
        }
        if self.write_queue_size == 0 {
            return Err("TCP write queue size must be greater than 0".to_string());
        }
        if self.max_frame_len == 0 {
            return Err("TCP max frame length must be greater than 0".to_string());
        }
        Ok(())
    }
}
