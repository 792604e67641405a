//! Core domain types

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use wstd_protocol::Value;

/// Number of random bytes in a generated identifier
const ID_BYTES: usize = 6;

/// Generate a random identifier: 12 lowercase hex characters
fn random_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Unique identifier for a physical connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random connection ID
    pub fn generate() -> Self {
        Self(random_id())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a logical client
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    /// Create a client ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random client ID
    ///
    /// Uniqueness among registered clients is enforced by the registry.
    pub fn generate() -> Self {
        Self(random_id())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Public view of an authorized client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identifier
    pub id: ClientId,
    /// Capability tags, in the order the client declared them
    pub intent: Vec<String>,
    /// Opaque metadata supplied at authorization
    pub info: Value,
}
