//! wstd-protocol: Wire protocol for the wstd topic/data broker
//!
//! This crate defines the message shape exchanged between the broker and its
//! peers over persistent WebSocket connections, the reserved control topics
//! and tunnel identifiers, and the two interchangeable wire encodings.

pub mod codec;
pub mod error;
pub mod message;
pub mod tunnel;
pub mod value;

pub use codec::{Frame, JsonCodec, MsgPackCodec, Transport, WireCodec};
pub use error::ProtocolError;
pub use message::{
    AuthorizeConfirmation, AuthorizeRequest, Message, FIELD_DATA, FIELD_TOPIC,
    FIELD_TUNNEL_ID, TOPIC_AUTHORIZE, TOPIC_DEAUTHORIZE,
};
pub use tunnel::{TunnelId, TunnelTarget};
pub use value::{from_json, map_get, Value};
