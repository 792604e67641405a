//! Broker configuration

use serde::{Deserialize, Serialize};
use wstd_protocol::Transport;

/// Configuration for the broker daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Port to listen on
    pub port: u16,

    /// Listen on all interfaces instead of loopback only
    pub allow_remote_connect: bool,

    /// Wire encoding used on every connection
    pub transport: Transport,

    /// Emit per-message send/receive traces
    pub debug: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            allow_remote_connect: true,
            transport: Transport::MsgPack,
            debug: false,
        }
    }
}

impl BrokerConfig {
    /// Host part of the listen address
    pub fn host(&self) -> &'static str {
        if self.allow_remote_connect {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Listen address (host:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host(), self.port)
    }
}
