//! Per-connection read loop
//!
//! Completes the WebSocket handshake, registers the connection with the
//! broker, feeds every data frame to the dispatcher and tears the
//! connection down when the loop ends for any reason.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use wstd_protocol::Frame;

use crate::broker::Broker;
use crate::server::sink::WsSink;

/// Serve one accepted TCP stream until it closes or `cancel` fires
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broker: Broker,
    cancel: CancellationToken,
) {
    let (path_tx, path_rx) = oneshot::channel();
    let handshake = tokio_tungstenite::accept_hdr_async(
        stream,
        move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = path_tx.send(request.uri().path().to_string());
            Ok(response)
        },
    );

    let ws = tokio::select! {
        _ = cancel.cancelled() => return,
        result = handshake => match result {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!("WebSocket handshake with {} failed: {}", peer_addr, e);
                return;
            }
        }
    };
    let path = path_rx.await.unwrap_or_else(|_| "/".to_string());

    let (writer, mut reader) = ws.split();
    let connection_id = broker
        .attach_connection(path, Some(peer_addr), Arc::new(WsSink::new(writer)))
        .await;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Socket [{}] handler cancelled", connection_id);
                break;
            }
            next = reader.next() => next,
        };

        match next {
            Some(Ok(WsMessage::Text(text))) => {
                broker
                    .handle_frame(&connection_id, Frame::Text(text.as_str().to_owned()))
                    .await;
            }
            Some(Ok(WsMessage::Binary(data))) => {
                broker
                    .handle_frame(&connection_id, Frame::Binary(data))
                    .await;
            }
            Some(Ok(WsMessage::Close(_))) | None => break,
            // Ping/pong are answered by the protocol layer
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!(
                    "Unexpected socket [{}] error in handler loop: {}",
                    connection_id,
                    e
                );
                break;
            }
        }
    }

    broker.detach_connection(&connection_id).await;
}
