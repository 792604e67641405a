//! Wire codecs for protocol messages
//!
//! Two interchangeable encodings are supported: a compact MessagePack map
//! encoding (sent as binary frames) and a JSON encoding (sent as text
//! frames). The encoding is selected once, when the broker is built.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::message::Message;
use crate::value::Value;

/// One encoded message as carried by a message-oriented transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Binary frame
    Binary(Bytes),
    /// Text frame
    Text(String),
}

impl Frame {
    /// Raw bytes of the frame, regardless of kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Binary(bytes) => bytes,
            Frame::Text(text) => text.as_bytes(),
        }
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encodes and decodes single wire messages
pub trait WireCodec: Send + Sync {
    /// Encode a message into a frame
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError>;

    /// Decode a frame into a message
    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError>;
}

/// MessagePack map encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl WireCodec for MsgPackCodec {
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let payload = rmp_serde::to_vec(&message.to_value())?;
        Ok(Frame::Binary(Bytes::from(payload)))
    }

    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        let value: Value = rmp_serde::from_slice(frame.as_bytes())?;
        Message::from_value(value)
    }
}

/// JSON object encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let payload = serde_json::to_string(&message.to_value())?;
        Ok(Frame::Text(payload))
    }

    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        let value: Value = serde_json::from_slice(frame.as_bytes())?;
        Message::from_value(value)
    }
}

/// Selects the wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Compact binary encoding
    #[default]
    MsgPack,
    /// Human-readable text encoding
    Json,
}

impl Transport {
    /// Build the codec for this transport
    pub fn codec(&self) -> Arc<dyn WireCodec> {
        match self {
            Transport::MsgPack => Arc::new(MsgPackCodec),
            Transport::Json => Arc::new(JsonCodec),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::MsgPack => write!(f, "msgpack"),
            Transport::Json => write!(f, "json"),
        }
    }
}

impl FromStr for Transport {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msgpack" => Ok(Transport::MsgPack),
            "json" => Ok(Transport::Json),
            other => Err(ProtocolError::UnknownTransport(other.to_string())),
        }
    }
}
