//! Message types for the wstd protocol
//!
//! Every frame on the wire decodes to a single key/value structure with a
//! required `topic`, an optional `data` payload and an optional `_tid_`
//! tunnel id. Any other top-level keys are carried along as `extra`.
//!
//! # Message Flow
//!
//! 1. Peer connects and sends `_auth_` (optionally with `_tid_` when it is a
//!    tunnel multiplexing several logical clients)
//! 2. Broker answers each non-controller client with `_auth_` carrying the
//!    assigned client id
//! 3. Data messages flow in both directions, routed by topic
//! 4. `_deauth_` removes a logical client; closing the socket removes all of
//!    them

use crate::error::ProtocolError;
use crate::tunnel::TunnelId;
use crate::value::{map_get, Value};

/// Control topic that creates or updates a logical client
pub const TOPIC_AUTHORIZE: &str = "_auth_";

/// Control topic that removes a logical client
pub const TOPIC_DEAUTHORIZE: &str = "_deauth_";

/// Field holding the message topic
pub const FIELD_TOPIC: &str = "topic";

/// Field holding the message payload
pub const FIELD_DATA: &str = "data";

/// Field holding the tunnel id
pub const FIELD_TUNNEL_ID: &str = "_tid_";

fn is_reserved(key: &Value) -> bool {
    matches!(
        key.as_str(),
        Some(FIELD_TOPIC) | Some(FIELD_DATA) | Some(FIELD_TUNNEL_ID)
    )
}

/// A single decoded wire message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Routing key
    pub topic: String,
    /// Application payload (absent is distinct from `null`)
    pub data: Option<Value>,
    /// Tunnel id of the logical client this message belongs to
    pub tunnel_id: Option<TunnelId>,
    /// Any other top-level entries, in wire order
    pub extra: Vec<(Value, Value)>,
}

impl Message {
    /// Create a message with only a topic
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            data: None,
            tunnel_id: None,
            extra: Vec::new(),
        }
    }

    /// Set the payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the tunnel id
    pub fn with_tunnel_id(mut self, tunnel_id: TunnelId) -> Self {
        self.tunnel_id = Some(tunnel_id);
        self
    }

    /// Merge extra top-level fields
    ///
    /// A key that is already present is replaced in place.
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = (Value, Value)>) -> Self {
        for (key, value) in extra {
            match self.extra.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => self.extra.push((key, value)),
            }
        }
        self
    }

    /// Look up an extra field by name
    pub fn extra_field(&self, key: &str) -> Option<&Value> {
        self.extra
            .iter()
            .rev()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Tunnel id, defaulting to [`TunnelId::DIRECT`]
    pub fn tunnel_id_or_direct(&self) -> TunnelId {
        self.tunnel_id.clone().unwrap_or_default()
    }

    /// Whether this message is one of the reserved control topics
    pub fn is_control(&self) -> bool {
        self.topic == TOPIC_AUTHORIZE || self.topic == TOPIC_DEAUTHORIZE
    }

    /// Build a message from a decoded value
    ///
    /// A `null` tunnel id counts as absent. A tunnel id of any other
    /// non-string type is rejected.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Map(entries) = value else {
            return Err(ProtocolError::NotAMap);
        };

        let mut topic = None;
        let mut data = None;
        let mut tunnel_id = None;
        let mut extra = Vec::new();
        for (key, value) in entries {
            match key.as_str() {
                Some(FIELD_TOPIC) => topic = Some(value),
                Some(FIELD_DATA) => data = Some(value),
                Some(FIELD_TUNNEL_ID) => tunnel_id = Some(value),
                _ => extra.push((key, value)),
            }
        }

        let topic = match topic {
            Some(Value::String(topic)) => topic.into_str().ok_or(ProtocolError::MissingTopic)?,
            _ => return Err(ProtocolError::MissingTopic),
        };

        let tunnel_id = match tunnel_id {
            None | Some(Value::Nil) => None,
            Some(Value::String(tid)) => {
                Some(TunnelId::new(tid.into_str().ok_or(ProtocolError::InvalidTunnelId)?))
            }
            Some(_) => return Err(ProtocolError::InvalidTunnelId),
        };

        Ok(Self {
            topic,
            data,
            tunnel_id,
            extra,
        })
    }

    /// Convert into a value ready for encoding
    ///
    /// Extra fields never shadow the reserved fields.
    pub fn to_value(&self) -> Value {
        let mut entries: Vec<(Value, Value)> = self
            .extra
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .cloned()
            .collect();
        entries.push((Value::from(FIELD_TOPIC), Value::from(self.topic.as_str())));
        if let Some(data) = &self.data {
            entries.push((Value::from(FIELD_DATA), data.clone()));
        }
        if let Some(tid) = &self.tunnel_id {
            entries.push((Value::from(FIELD_TUNNEL_ID), Value::from(tid.as_str())));
        }
        Value::Map(entries)
    }
}

/// Payload of an `_auth_` request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeRequest {
    /// Opaque metadata supplied by the client
    pub info: Value,
    /// Capability tags
    pub intent: Vec<String>,
}

impl Default for AuthorizeRequest {
    fn default() -> Self {
        Self {
            info: Value::Nil,
            intent: Vec::new(),
        }
    }
}

impl AuthorizeRequest {
    /// Extract the request from an `_auth_` payload
    ///
    /// Never fails: anything that is not a map yields an empty request, and
    /// non-string intent entries are skipped.
    pub fn from_data(data: Option<&Value>) -> Self {
        let Some(data) = data else {
            return Self::default();
        };

        let info = map_get(data, "info").cloned().unwrap_or(Value::Nil);
        let intent = match map_get(data, "intent") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Self { info, intent }
    }
}

/// Payload of the `_auth_` confirmation sent back to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeConfirmation {
    /// Assigned client id
    pub client_id: String,
    /// Intent the client was registered with
    pub intent: Vec<String>,
}

impl AuthorizeConfirmation {
    /// Payload as sent on the wire
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from("client_id"), Value::from(self.client_id.as_str())),
            (
                Value::from("intent"),
                Value::Array(self.intent.iter().map(|i| Value::from(i.as_str())).collect()),
            ),
        ])
    }

    /// Parse a confirmation payload
    pub fn from_value(value: &Value) -> Option<Self> {
        let client_id = map_get(value, "client_id")?.as_str()?.to_string();
        let intent = match map_get(value, "intent")? {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => return None,
        };
        Some(Self { client_id, intent })
    }
}
