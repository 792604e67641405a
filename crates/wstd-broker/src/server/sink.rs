//! Write half of a WebSocket connection

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;

use wstd_core::error::ConnectionError;
use wstd_core::traits::FrameSink;
use wstd_protocol::Frame;

type WsWriter = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// [`FrameSink`] over the write half of an accepted WebSocket
///
/// Writes are serialized by a mutex, so concurrent dispatch units never
/// interleave frames.
pub struct WsSink {
    writer: Mutex<WsWriter>,
}

impl WsSink {
    /// Wrap the write half of a split socket
    pub fn new(writer: WsWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

fn map_error(e: tungstenite::Error) -> ConnectionError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectionError::Closed
        }
        other => ConnectionError::SendFailed(other.to_string()),
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError> {
        let message = match frame {
            Frame::Binary(bytes) => WsMessage::Binary(bytes),
            Frame::Text(text) => WsMessage::Text(text.into()),
        };
        self.writer.lock().await.send(message).await.map_err(map_error)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.writer.lock().await.close().await.map_err(map_error)
    }
}
