//! Outbound send pipeline
//!
//! Every send goes through [`Broker::write_message`]: one encode with the
//! configured codec and one write on the physical connection. Write errors
//! are logged and reported as `false`, never propagated.

use wstd_core::types::ClientId;
use wstd_protocol::{Message, TunnelId, TunnelTarget, Value};

use crate::broker::Broker;
use crate::connection::SocketConnection;

fn outbound(topic: &str, data: Value, extra: Option<&[(Value, Value)]>) -> Message {
    let message = Message::new(topic).with_data(data);
    match extra {
        Some(extra) => message.with_extra(extra.iter().cloned()),
        None => message,
    }
}

impl Broker {
    /// Encode and write one message on a connection
    ///
    /// The tunnel id is only put on the wire for tunnel connections, and
    /// never when it is the direct marker.
    pub(crate) async fn write_message(
        &self,
        connection: &SocketConnection,
        mut message: Message,
        tunnel_id: Option<TunnelId>,
        target: &str,
    ) -> bool {
        message.tunnel_id = tunnel_id.filter(|tid| connection.is_tunnel() && !tid.is_direct());

        let route = match (&message.tunnel_id, connection.is_tunnel()) {
            (_, false) => "DIRECT".to_string(),
            (Some(tid), true) => format!("TUNNEL:{}", tid),
            (None, true) => "TUNNEL:TUNNEL".to_string(),
        };
        tracing::debug!(
            "[SEND on {} to {}][{}] {}",
            connection.id,
            target,
            route,
            message.topic
        );

        let frame = match self.codec().encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(
                    "Failed to encode {} for {} on {}: {}",
                    message.topic,
                    target,
                    connection.id,
                    e
                );
                return false;
            }
        };

        match connection.send_frame(frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "Error during SEND on {} to {}: {}",
                    connection.id,
                    target,
                    e
                );
                false
            }
        }
    }

    /// Send to one client
    ///
    /// Returns false if the client or its connection is gone, or the write
    /// failed.
    pub async fn send_to_client(
        &self,
        topic: &str,
        data: Value,
        client_id: &ClientId,
        extra: Option<&[(Value, Value)]>,
    ) -> bool {
        let coordinator = self.coordinator();
        let Some(client) = coordinator.clients.get(client_id) else {
            return false;
        };
        let Some(connection) = coordinator.connections.get(&client.connection_id) else {
            return false;
        };

        self.write_message(
            &connection,
            outbound(topic, data, extra),
            Some(client.tunnel_id.clone()),
            client_id.as_str(),
        )
        .await
    }

    /// Send to every client whose intent matches the filter
    ///
    /// A tunnel connection gets a single message addressed to all of its
    /// clients when every tunneled client matches; otherwise each matching
    /// client is addressed individually. Returns the number of frames
    /// written.
    pub async fn broadcast(
        &self,
        topic: &str,
        data: Value,
        intent_filter: Option<&str>,
        extra: Option<&[(Value, Value)]>,
    ) -> usize {
        let coordinator = self.coordinator();
        let message = outbound(topic, data, extra);
        let mut written = 0;

        for connection in coordinator.connections.list() {
            let clients: Vec<_> = connection
                .client_ids()
                .iter()
                .filter_map(|client_id| coordinator.clients.get(client_id))
                .collect();

            if !connection.is_tunnel() {
                for client in clients.iter().filter(|c| c.matches_intent(intent_filter)) {
                    if self
                        .write_message(&connection, message.clone(), None, client.id.as_str())
                        .await
                    {
                        written += 1;
                    }
                }
                continue;
            }

            let tunneled: Vec<_> = clients
                .iter()
                .filter(|client| !client.is_tunnel_controller())
                .collect();
            let matching: Vec<_> = tunneled
                .iter()
                .filter(|client| client.matches_intent(intent_filter))
                .collect();

            if matching.len() == tunneled.len() {
                if self
                    .write_message(
                        &connection,
                        message.clone(),
                        Some(TunnelId::ALL_CLIENTS),
                        TunnelId::ALL_CLIENTS.as_str(),
                    )
                    .await
                {
                    written += 1;
                }
            } else {
                for client in matching {
                    if self
                        .write_message(
                            &connection,
                            message.clone(),
                            Some(client.tunnel_id.clone()),
                            client.id.as_str(),
                        )
                        .await
                    {
                        written += 1;
                    }
                }
            }
        }

        written
    }

    /// Send to the multiplexing layer of every tunnel connection
    ///
    /// Returns true only if at least one tunnel connection exists and every
    /// write succeeded.
    pub async fn send_tunnel(
        &self,
        topic: &str,
        data: Value,
        target: TunnelTarget,
        extra: Option<&[(Value, Value)]>,
    ) -> bool {
        let message = outbound(topic, data, extra);
        let tunnel_id = target.tunnel_id();
        let label = tunnel_id
            .as_ref()
            .map_or("TUNNEL", |tid| tid.as_str())
            .to_string();

        let mut sent_any = false;
        let mut all_ok = true;
        for connection in self.coordinator().connections.list() {
            if !connection.is_tunnel() {
                continue;
            }
            sent_any = true;
            let ok = self
                .write_message(&connection, message.clone(), tunnel_id.clone(), &label)
                .await;
            all_ok &= ok;
        }

        sent_any && all_ok
    }

    /// Send to one client when an id is given, otherwise broadcast
    ///
    /// Returns the number of frames written.
    pub async fn send(
        &self,
        topic: &str,
        data: Value,
        client_id: Option<&ClientId>,
        intent_filter: Option<&str>,
        extra: Option<&[(Value, Value)]>,
    ) -> usize {
        match client_id {
            Some(client_id) if !client_id.as_str().is_empty() => {
                usize::from(self.send_to_client(topic, data, client_id, extra).await)
            }
            _ => self.broadcast(topic, data, intent_filter, extra).await,
        }
    }
}
