//! Application hooks invoked by the broker
//!
//! Every method has a no-op default, so an embedding application only
//! overrides the events it cares about.

use async_trait::async_trait;

use wstd_core::types::{ClientId, ClientInfo};
use wstd_protocol::{Message, Value};

use crate::broker::Broker;

static NIL: Value = Value::Nil;

/// A data message from an authorized client
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender
    pub client_id: ClientId,
    /// Whether the sender is a tunnel controller
    pub is_tunnel_controller: bool,
    /// Full decoded message, extra keys included
    pub message: Message,
}

impl InboundMessage {
    /// Message topic
    pub fn topic(&self) -> &str {
        &self.message.topic
    }

    /// Message payload, `null` when absent
    pub fn data(&self) -> &Value {
        self.message.data.as_ref().unwrap_or(&NIL)
    }
}

/// Callbacks for client lifecycle and inbound data
#[async_trait]
pub trait BrokerHooks: Send + Sync + 'static {
    /// Called once before the listener starts accepting
    async fn on_start(&self, _broker: &Broker) {}

    /// A new regular client authorized for the first time
    async fn on_client_connected(&self, _broker: &Broker, _client_id: &ClientId) {}

    /// A client (regular or controller) is new or changed its intent/info
    async fn on_client_authorized(&self, _broker: &Broker, _client: &ClientInfo) {}

    /// A regular client was removed
    async fn on_client_disconnected(&self, _broker: &Broker, _client_id: &ClientId) {}

    /// A new tunnel controller authorized for the first time
    async fn on_tunnel_controller_connected(&self, _broker: &Broker, _client_id: &ClientId) {}

    /// A tunnel controller was removed
    async fn on_tunnel_controller_disconnected(&self, _broker: &Broker, _client_id: &ClientId) {}

    /// A data message arrived; runs as its own task
    async fn on_message(&self, _broker: &Broker, _message: InboundMessage) {}

    /// Called by graceful shutdown before connections are closed
    async fn on_shutdown(&self, _broker: &Broker) {}
}

/// Hooks that ignore every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl BrokerHooks for NoopHooks {}
