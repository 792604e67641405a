//! Authorization of logical clients
//!
//! A connection starts out undetermined. The first `_auth_` decides whether
//! it serves a single direct client (tunnel id `_`) or a set of tunneled
//! clients behind a controller. Once a connection is in tunnel mode it stays
//! there; mixing the two kinds is rejected.

use thiserror::Error;

use wstd_core::types::{ClientId, ConnectionId};
use wstd_protocol::{AuthorizeConfirmation, AuthorizeRequest, Message, TunnelId, TOPIC_AUTHORIZE};

use crate::broker::Broker;
use crate::client::ClientHandle;
use crate::connection::SocketConnection;

/// Why an `_auth_` request was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// The connection is gone
    #[error("Socket [{0}] is not connected")]
    UnknownConnection(ConnectionId),

    /// Direct client on a connection already in tunnel mode
    #[error("Non-tunnelled client tried to authorize to a tunnelled socket [{0}]")]
    DirectOnTunnel(ConnectionId),

    /// Tunneled client on a connection already serving a direct client
    #[error("Tunnelled client tried to authorize with tunnel id [{1}] on a direct socket [{0}]")]
    TunnelOnDirect(ConnectionId, TunnelId),

    /// The in-tunnel broadcast address cannot name a client
    #[error("Tunnel id [{1}] on socket [{0}] is reserved")]
    ReservedTunnelId(ConnectionId, TunnelId),
}

/// Result of a successful authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Assigned (or existing) client id
    pub client_id: ClientId,
    /// Whether the client was created by this request
    pub created: bool,
    /// Whether the client is new or its intent/info changed
    pub changed: bool,
}

impl Broker {
    /// Create or update the client for a tunnel id on a connection
    pub async fn authorize_client(
        &self,
        connection_id: &ConnectionId,
        tunnel_id: TunnelId,
        request: AuthorizeRequest,
    ) -> Result<AuthOutcome, AuthRejection> {
        let coordinator = self.coordinator();
        let is_controller = tunnel_id.is_controller();

        let (connection, client, outcome) = {
            let _lock = coordinator.write().await;

            let connection = coordinator
                .connections
                .get(connection_id)
                .ok_or_else(|| AuthRejection::UnknownConnection(connection_id.clone()))?;

            if tunnel_id.is_all_clients() {
                return Err(AuthRejection::ReservedTunnelId(
                    connection_id.clone(),
                    tunnel_id,
                ));
            }

            if connection.is_tunnel() {
                if tunnel_id.is_direct() {
                    return Err(AuthRejection::DirectOnTunnel(connection_id.clone()));
                }
            } else if !tunnel_id.is_direct() {
                if connection.client_count() == 0 {
                    connection.mark_tunnel();
                } else {
                    return Err(AuthRejection::TunnelOnDirect(
                        connection_id.clone(),
                        tunnel_id,
                    ));
                }
            }

            let existing = coordinator.resolve(&connection, &tunnel_id);
            let client_id = match &existing {
                Some(client) => client.id.clone(),
                None => coordinator.clients.allocate_id(),
            };
            let changed = existing.as_ref().map_or(true, |client| {
                client.intent != request.intent || client.info != request.info
            });

            connection.bind(tunnel_id.clone(), client_id.clone());
            let client = coordinator.clients.insert(ClientHandle {
                id: client_id.clone(),
                connection_id: connection_id.clone(),
                tunnel_id: tunnel_id.clone(),
                intent: request.intent,
                info: request.info,
            });

            let outcome = AuthOutcome {
                client_id,
                created: existing.is_none(),
                changed,
            };
            (connection, client, outcome)
        };

        if outcome.created {
            tracing::info!(
                "Client [{}] on socket [{}] connected!",
                client.id,
                connection_id
            );
            if is_controller {
                self.hooks()
                    .on_tunnel_controller_connected(self, &client.id)
                    .await;
            } else {
                self.hooks().on_client_connected(self, &client.id).await;
            }
        }

        if is_controller {
            tracing::info!(
                "Tunnel controller client [{}] authorized on socket [{}] with info [{}]!",
                client.id,
                connection_id,
                client.info
            );
        } else {
            self.confirm_authorization(&connection, &client).await;
            tracing::info!(
                "Client [{}] on socket [{}] authorized as {:?}!",
                client.id,
                connection_id,
                client.intent
            );
        }

        if outcome.changed {
            self.hooks()
                .on_client_authorized(self, &client.to_info())
                .await;
        }

        Ok(outcome)
    }

    /// Remove the client for a tunnel id on a connection
    ///
    /// Returns false if no client was registered there.
    pub async fn deauthorize_client(
        &self,
        connection_id: &ConnectionId,
        tunnel_id: &TunnelId,
    ) -> bool {
        let coordinator = self.coordinator();

        let client = {
            let _lock = coordinator.write().await;
            coordinator
                .connections
                .get(connection_id)
                .and_then(|connection| connection.unbind(tunnel_id))
                .and_then(|client_id| coordinator.clients.remove(&client_id))
        };

        let Some(client) = client else {
            return false;
        };

        tracing::info!(
            "Client [{}] on socket [{}] disconnected!",
            client.id,
            connection_id
        );
        if client.is_tunnel_controller() {
            self.hooks()
                .on_tunnel_controller_disconnected(self, &client.id)
                .await;
        } else {
            self.hooks().on_client_disconnected(self, &client.id).await;
        }
        true
    }

    async fn confirm_authorization(
        &self,
        connection: &SocketConnection,
        client: &ClientHandle,
    ) {
        let confirmation = AuthorizeConfirmation {
            client_id: client.id.to_string(),
            intent: client.intent.clone(),
        };
        let message = Message::new(TOPIC_AUTHORIZE).with_data(confirmation.to_value());
        self.write_message(
            connection,
            message,
            Some(client.tunnel_id.clone()),
            client.id.as_str(),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Event, RecordingHooks, RecordingSink};
    use serde_json::json;
    use std::sync::Arc;
    use wstd_core::types::ClientInfo;
    use wstd_protocol::{from_json, Transport, Value};

    fn request(intent: &[&str], info: serde_json::Value) -> AuthorizeRequest {
        AuthorizeRequest {
            info: from_json(info),
            intent: intent.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn setup() -> (
        Broker,
        Arc<RecordingHooks>,
        ConnectionId,
        crate::testutil::Frames,
    ) {
        let hooks = RecordingHooks::new();
        let broker = Broker::with_hooks(Transport::Json, hooks.clone());
        let (sink, frames) = RecordingSink::new();
        let conn = broker.attach_connection("/", None, sink).await;
        (broker, hooks, conn, frames)
    }

    #[tokio::test]
    async fn test_direct_authorize_confirms() {
        let (broker, hooks, conn, frames) = setup().await;

        let outcome = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&["sensor"], json!({"n": 1})))
            .await
            .unwrap();
        assert!(outcome.created);
        assert!(outcome.changed);

        let sent = frames.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, TOPIC_AUTHORIZE);
        assert_eq!(
            sent[0].data,
            Some(from_json(
                json!({ "client_id": outcome.client_id.as_str(), "intent": ["sensor"] })
            ))
        );
        // Direct connections never carry a tunnel id
        assert_eq!(sent[0].tunnel_id, None);

        assert_eq!(
            hooks.events(),
            vec![
                Event::Connected(outcome.client_id.clone()),
                Event::Authorized(ClientInfo {
                    id: outcome.client_id,
                    intent: vec!["sensor".to_string()],
                    info: from_json(json!({"n": 1})),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_reauthorize_updates_in_place() {
        let (broker, hooks, conn, frames) = setup().await;

        let first = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&["a"], json!(null)))
            .await
            .unwrap();
        let second = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&["a"], json!(null)))
            .await
            .unwrap();

        assert_eq!(first.client_id, second.client_id);
        assert!(!second.created);
        assert!(!second.changed);
        assert_eq!(broker.client_count(true), 1);
        // Both requests are confirmed
        assert_eq!(frames.len(), 2);

        let authorized = hooks
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Authorized(_)))
            .count();
        assert_eq!(authorized, 1);

        let third = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&["a", "b"], json!(null)))
            .await
            .unwrap();
        assert_eq!(third.client_id, first.client_id);
        assert!(third.changed);
        assert_eq!(
            broker.get_client(&first.client_id).unwrap().intent,
            vec!["a".to_string(), "b".to_string()]
        );

        let events = hooks.events();
        let connected = events
            .iter()
            .filter(|e| matches!(e, Event::Connected(_)))
            .count();
        let authorized = events
            .iter()
            .filter(|e| matches!(e, Event::Authorized(_)))
            .count();
        assert_eq!(connected, 1);
        assert_eq!(authorized, 2);
    }

    #[tokio::test]
    async fn test_reauthorize_with_new_info_fires_authorized() {
        let (broker, hooks, conn, _frames) = setup().await;

        let first = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&["a"], json!({"v": 1})))
            .await
            .unwrap();
        let second = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&["a"], json!({"v": 2})))
            .await
            .unwrap();

        assert_eq!(second.client_id, first.client_id);
        assert!(!second.created);
        assert!(second.changed);
        assert_eq!(
            broker.get_client(&first.client_id).unwrap().info,
            from_json(json!({"v": 2}))
        );

        let authorized: Vec<_> = hooks
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Authorized(info) => Some(info),
                _ => None,
            })
            .collect();
        assert_eq!(authorized.len(), 2);
        assert_eq!(authorized[1].intent, vec!["a".to_string()]);
        assert_eq!(authorized[1].info, from_json(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_tunnel_on_direct_rejected() {
        let (broker, _hooks, conn, _frames) = setup().await;
        let direct = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&[], json!(null)))
            .await
            .unwrap();

        let result = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&[], json!(null)))
            .await;

        assert_eq!(
            result,
            Err(AuthRejection::TunnelOnDirect(conn.clone(), TunnelId::new("t1")))
        );
        let stored = broker.coordinator().connections.get(&conn).unwrap();
        assert!(!stored.is_tunnel());
        assert_eq!(stored.client_ids(), vec![direct.client_id]);
        assert_eq!(broker.client_count(true), 1);
    }

    #[tokio::test]
    async fn test_direct_on_tunnel_rejected() {
        let (broker, _hooks, conn, frames) = setup().await;
        broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&[], json!(null)))
            .await
            .unwrap();
        assert!(broker.coordinator().connections.get(&conn).unwrap().is_tunnel());

        let result = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&[], json!(null)))
            .await;

        assert_eq!(result, Err(AuthRejection::DirectOnTunnel(conn.clone())));
        assert_eq!(broker.client_count(true), 1);
        // Only the first confirmation was written
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn test_tunnel_flag_survives_deauthorize() {
        let (broker, _hooks, conn, _frames) = setup().await;
        broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&[], json!(null)))
            .await
            .unwrap();
        assert!(broker.deauthorize_client(&conn, &TunnelId::new("t1")).await);

        let result = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&[], json!(null)))
            .await;
        assert!(matches!(result, Err(AuthRejection::DirectOnTunnel(_))));
    }

    #[tokio::test]
    async fn test_all_clients_marker_rejected() {
        let (broker, _hooks, conn, _frames) = setup().await;
        let result = broker
            .authorize_client(&conn, TunnelId::ALL_CLIENTS, request(&[], json!(null)))
            .await;
        assert!(matches!(result, Err(AuthRejection::ReservedTunnelId(_, _))));
        assert!(!broker.coordinator().connections.get(&conn).unwrap().is_tunnel());
    }

    #[tokio::test]
    async fn test_controller_not_confirmed() {
        let (broker, hooks, conn, frames) = setup().await;

        let controller = broker
            .authorize_client(&conn, TunnelId::CONTROLLER, request(&[], json!("proxy")))
            .await
            .unwrap();
        let client = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&["x"], json!(null)))
            .await
            .unwrap();

        let sent = frames.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tunnel_id, Some(TunnelId::new("t1")));

        let events = hooks.events();
        assert_eq!(events[0], Event::ControllerConnected(controller.client_id.clone()));
        assert!(matches!(&events[1], Event::Authorized(info) if info.id == controller.client_id));
        assert_eq!(events[2], Event::Connected(client.client_id));

        assert_eq!(broker.client_count(false), 1);
        assert_eq!(broker.client_count(true), 2);
        assert_eq!(broker.list_tunnel_controllers()[0].info, Value::from("proxy"));
    }

    #[tokio::test]
    async fn test_deauthorize() {
        let (broker, hooks, conn, _frames) = setup().await;
        let controller = broker
            .authorize_client(&conn, TunnelId::CONTROLLER, request(&[], json!(null)))
            .await
            .unwrap();
        let client = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&[], json!(null)))
            .await
            .unwrap();
        hooks.clear();

        assert!(broker.deauthorize_client(&conn, &TunnelId::new("t1")).await);
        assert!(!broker.deauthorize_client(&conn, &TunnelId::new("t1")).await);
        assert!(broker.deauthorize_client(&conn, &TunnelId::CONTROLLER).await);

        assert_eq!(
            hooks.events(),
            vec![
                Event::Disconnected(client.client_id),
                Event::ControllerDisconnected(controller.client_id),
            ]
        );
        assert_eq!(broker.client_count(true), 0);
    }

    #[tokio::test]
    async fn test_client_ids_unique_across_connections() {
        let (broker, _hooks, _conn, _frames) = setup().await;
        let mut ids = std::collections::HashSet::new();
        for _ in 0..16 {
            let (sink, _frames) = RecordingSink::new();
            let conn = broker.attach_connection("/", None, sink).await;
            let outcome = broker
                .authorize_client(&conn, TunnelId::DIRECT, request(&[], json!(null)))
                .await
                .unwrap();
            assert!(ids.insert(outcome.client_id));
        }
        assert_eq!(broker.client_count(false), 16);
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let (broker, _hooks, _conn, _frames) = setup().await;
        let missing = ConnectionId::new("gone");
        let result = broker
            .authorize_client(&missing, TunnelId::DIRECT, request(&[], json!(null)))
            .await;
        assert_eq!(result, Err(AuthRejection::UnknownConnection(missing.clone())));
        assert!(!broker.deauthorize_client(&missing, &TunnelId::DIRECT).await);
    }
}
