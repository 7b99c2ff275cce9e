//! Model: ReceiverConfig.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::{LogFormat, MAX_EVENT_SIZE, SNIFF_LIMIT};

pub const DEFAULT_PORT: u16 = 4505;
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;
pub const DEFAULT_LOGGER: &str = "TcpLogger";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub port: u16,
    /// Listen on `[::]` instead of `0.0.0.0`.
    pub ipv6: bool,
    /// Receive buffer hint (SO_RCVBUF) and read chunk size.
    pub buffer_size: usize,
    /// Pin one schema instead of detecting it per connection.
    pub parser: Option<LogFormat>,
    /// Logger name for records that carry none, including synthetic error records.
    pub default_logger: String,
    pub poll_interval_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub max_event_size: usize,
    pub sniff_limit: usize,
    pub backlog: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ipv6: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            parser: None,
            default_logger: DEFAULT_LOGGER.to_string(),
            poll_interval_ms: 300,
            reconnect_backoff_ms: 1000,
            max_event_size: MAX_EVENT_SIZE,
            sniff_limit: SNIFF_LIMIT,
            backlog: 100,
        }
    }
}

impl ReceiverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}
