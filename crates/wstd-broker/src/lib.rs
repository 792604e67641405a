//! wstd-broker: Topic pub/sub broker over tunneled WebSocket connections
//!
//! Peers connect over WebSocket and authorize one or more logical clients
//! per connection. A plain peer owns its connection as a single direct
//! client; a tunnel controller multiplexes many remote clients over one
//! connection, each addressed by a tunnel id. Data messages are routed by
//! topic to application hooks, and the broker can reply to one client,
//! broadcast by intent, or address the tunnel layer itself.

pub mod api;
pub mod auth;
pub mod broker;
pub mod client;
pub mod connection;
pub mod coordinator;
pub mod dispatch;
pub mod hooks;
pub mod send;
pub mod server;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::{ApiRouter, AutoResponse, MethodCall};
pub use auth::{AuthOutcome, AuthRejection};
pub use broker::Broker;
pub use coordinator::StateCoordinator;
pub use hooks::{BrokerHooks, InboundMessage, NoopHooks};
pub use server::BrokerServer;
