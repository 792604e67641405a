//! WebSocket server implementation

mod handler;
mod listener;
mod sink;

pub use listener::BrokerServer;
pub use sink::WsSink;
