//! Connection traits

use async_trait::async_trait;

use crate::error::ConnectionError;
use wstd_protocol::Frame;

/// Write half of a physical connection
///
/// The broker core only ever talks to sockets through this trait, so the
/// registries and send pipeline stay independent of the concrete transport.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Write one frame, resolving once the write has completed
    async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError>;

    /// Close the connection gracefully
    async fn close(&self) -> Result<(), ConnectionError>;
}
