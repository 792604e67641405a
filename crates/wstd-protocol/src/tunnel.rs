//! Tunnel identifier type

use std::borrow::Cow;
use std::fmt;

/// Identifies a logical client multiplexed over one physical connection
///
/// Three values are reserved: [`TunnelId::DIRECT`] for a client that owns its
/// connection outright, [`TunnelId::CONTROLLER`] for the multiplexing proxy
/// itself, and [`TunnelId::ALL_CLIENTS`] as the in-tunnel broadcast address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TunnelId(Cow<'static, str>);

impl TunnelId {
    /// Default tunnel id of a non-tunneled client
    pub const DIRECT: TunnelId = TunnelId(Cow::Borrowed("_"));

    /// Tunnel id of the tunnel controller
    pub const CONTROLLER: TunnelId = TunnelId(Cow::Borrowed("@"));

    /// Address of every client behind a tunnel connection
    pub const ALL_CLIENTS: TunnelId = TunnelId(Cow::Borrowed("*"));

    /// Create a tunnel ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default "no tunnel" id
    pub fn is_direct(&self) -> bool {
        *self == Self::DIRECT
    }

    /// Whether this is the tunnel controller marker
    pub fn is_controller(&self) -> bool {
        *self == Self::CONTROLLER
    }

    /// Whether this is the in-tunnel broadcast address
    pub fn is_all_clients(&self) -> bool {
        *self == Self::ALL_CLIENTS
    }
}

impl Default for TunnelId {
    fn default() -> Self {
        Self::DIRECT
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TunnelId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&str> for TunnelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which part of a tunnel connection a tunnel message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelTarget {
    /// The multiplexer and every client behind it (no tunnel id on the wire)
    All,
    /// Only the tunnel controller
    Controller,
    /// Only the clients behind the tunnel
    Clients,
}

impl TunnelTarget {
    /// Tunnel id written on the wire for this target, if any
    pub fn tunnel_id(&self) -> Option<TunnelId> {
        match self {
            TunnelTarget::All => None,
            TunnelTarget::Controller => Some(TunnelId::CONTROLLER),
            TunnelTarget::Clients => Some(TunnelId::ALL_CLIENTS),
        }
    }
}
