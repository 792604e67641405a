//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Decoded value is not a key/value structure
    #[error("Message is not a map")]
    NotAMap,

    /// `topic` field is absent or not a string
    #[error("Message topic is missing or not a string")]
    MissingTopic,

    /// `_tid_` field is present but not a string
    #[error("Tunnel id must be absent or a string")]
    InvalidTunnelId,

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encode error
    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MessagePack decode error
    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Unknown transport name
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),
}
