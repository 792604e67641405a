//! Connection management

mod pool;

pub use pool::{ConnectionPool, SocketConnection};
