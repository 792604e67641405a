//! Inbound frame dispatch

use std::sync::Arc;

use wstd_core::types::ConnectionId;
use wstd_protocol::{AuthorizeRequest, Frame, Message, TOPIC_AUTHORIZE, TOPIC_DEAUTHORIZE};

use crate::broker::Broker;
use crate::connection::SocketConnection;
use crate::hooks::InboundMessage;

impl Broker {
    /// Handle one frame read from a connection
    ///
    /// Malformed frames and data from unauthorized tunnel ids are logged
    /// and dropped; the connection keeps reading either way.
    pub async fn handle_frame(&self, connection_id: &ConnectionId, frame: Frame) {
        let Some(connection) = self.coordinator().connections.get(connection_id) else {
            tracing::debug!("Dropping frame for closed socket [{}]", connection_id);
            return;
        };

        let message = match self.codec().decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    "Discarding malformed message on socket [{}]: {}",
                    connection_id,
                    e
                );
                return;
            }
        };

        let tunnel_id = message.tunnel_id_or_direct();
        match message.topic.as_str() {
            TOPIC_AUTHORIZE => {
                let request = AuthorizeRequest::from_data(message.data.as_ref());
                if let Err(e) = self.authorize_client(connection_id, tunnel_id, request).await {
                    tracing::warn!("{}!", e);
                }
            }
            TOPIC_DEAUTHORIZE => {
                self.deauthorize_client(connection_id, &tunnel_id).await;
            }
            _ => self.dispatch(&connection, message),
        }
    }

    /// Spawn a dispatch unit for a data message
    fn dispatch(&self, connection: &Arc<SocketConnection>, message: Message) {
        let tunnel_id = message.tunnel_id_or_direct();
        let Some(client) = self.coordinator().resolve(connection, &tunnel_id) else {
            tracing::warn!(
                "Socket [{}] received message ['{}'] from unauthorized client!",
                connection.id,
                message.topic
            );
            return;
        };

        tracing::debug!(
            "[RECV on [{}] from {}] {}",
            connection.id,
            client.id,
            message.topic
        );

        let inbound = InboundMessage {
            client_id: client.id.clone(),
            is_tunnel_controller: tunnel_id.is_controller(),
            message,
        };

        let broker = self.clone();
        let cancel = connection.cancel_token().clone();
        let connection_id = connection.id.clone();
        connection.tasks().spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Dispatch cancelled on socket [{}]", connection_id);
                }
                _ = broker.hooks().on_message(&broker, inbound) => {}
            }
        });
    }
}
