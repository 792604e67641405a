//! Broker handle and connection lifecycle
//!
//! [`Broker`] is a cheap-to-clone handle over the shared registries, the
//! configured codec and the application hooks. Authorization, dispatch and
//! the send pipeline are implemented on it in their own modules.

use std::net::SocketAddr;
use std::sync::Arc;

use wstd_core::config::BrokerConfig;
use wstd_core::traits::FrameSink;
use wstd_core::types::{ClientId, ClientInfo, ConnectionId};
use wstd_protocol::{Transport, WireCodec};

use crate::connection::SocketConnection;
use crate::coordinator::StateCoordinator;
use crate::hooks::BrokerHooks;

/// Topic pub/sub broker
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    coordinator: StateCoordinator,
    codec: Arc<dyn WireCodec>,
    transport: Transport,
    hooks: Arc<dyn BrokerHooks>,
}

impl Broker {
    /// Create a broker speaking the given transport
    pub fn new(transport: Transport, hooks: impl BrokerHooks) -> Self {
        Self::with_hooks(transport, Arc::new(hooks))
    }

    /// Create a broker with shared hooks
    pub fn with_hooks(transport: Transport, hooks: Arc<dyn BrokerHooks>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                coordinator: StateCoordinator::new(),
                codec: transport.codec(),
                transport,
                hooks,
            }),
        }
    }

    /// Create a broker from configuration
    pub fn from_config(config: &BrokerConfig, hooks: impl BrokerHooks) -> Self {
        Self::new(config.transport, hooks)
    }

    /// Wire encoding in use
    pub fn transport(&self) -> Transport {
        self.inner.transport
    }

    /// Shared registries
    pub fn coordinator(&self) -> &StateCoordinator {
        &self.inner.coordinator
    }

    pub(crate) fn codec(&self) -> &dyn WireCodec {
        self.inner.codec.as_ref()
    }

    pub(crate) fn hooks(&self) -> &dyn BrokerHooks {
        self.inner.hooks.as_ref()
    }

    /// Intent and metadata of a client
    pub fn get_client(&self, client_id: &ClientId) -> Option<ClientInfo> {
        self.inner
            .coordinator
            .clients
            .get(client_id)
            .map(|client| client.to_info())
    }

    /// Connected clients, optionally including tunnel controllers
    pub fn list_clients(&self, include_controllers: bool) -> Vec<ClientInfo> {
        self.inner
            .coordinator
            .clients
            .list(include_controllers)
            .iter()
            .map(|client| client.to_info())
            .collect()
    }

    /// Connected tunnel controllers
    pub fn list_tunnel_controllers(&self) -> Vec<ClientInfo> {
        self.inner
            .coordinator
            .clients
            .list_controllers()
            .iter()
            .map(|client| client.to_info())
            .collect()
    }

    /// Number of connected clients, optionally including tunnel controllers
    pub fn client_count(&self, include_controllers: bool) -> usize {
        self.inner.coordinator.clients.count(include_controllers)
    }

    /// Number of live physical connections
    pub fn connection_count(&self) -> usize {
        self.inner.coordinator.connections.len()
    }

    /// Invoke the start hook
    pub async fn start(&self) {
        self.hooks().on_start(self).await;
    }

    /// Register a newly accepted socket
    pub async fn attach_connection(
        &self,
        path: impl Into<String>,
        peer_addr: Option<SocketAddr>,
        sink: Arc<dyn FrameSink>,
    ) -> ConnectionId {
        let _lock = self.inner.coordinator.read().await;
        let connection = self
            .inner
            .coordinator
            .register_connection(SocketConnection::new(path, peer_addr, sink));

        tracing::info!(
            "Socket [{}] connected on {} from {}",
            connection.id,
            connection.path,
            connection
                .peer_addr
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        connection.id.clone()
    }

    /// Tear down a connection once its read loop has ended
    ///
    /// Cancels every in-flight dispatch unit, removes all clients the
    /// connection owned and fires one disconnect hook per client.
    pub async fn detach_connection(&self, connection_id: &ConnectionId) {
        let (connection, clients) = self
            .inner
            .coordinator
            .atomic_disconnect(connection_id)
            .await;

        let Some(connection) = connection else {
            tracing::debug!("Socket [{}] already removed", connection_id);
            return;
        };

        let pending = connection.pending_tasks();
        if pending > 0 {
            tracing::info!(
                "Socket [{}] disconnected, cancelling {} pending tasks...",
                connection_id,
                pending
            );
        }
        connection.cancel_token().cancel();
        connection.tasks().close();
        connection.tasks().wait().await;

        if !clients.is_empty() {
            tracing::info!(
                "Socket [{}] disconnected, removing {} clients...",
                connection_id,
                clients.len()
            );
        }
        for client in clients {
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
        }

        tracing::info!("Socket [{}] disconnected", connection_id);
    }

    /// Close every connection and clear both registries
    ///
    /// Disconnect hooks are not fired for clients removed this way.
    pub async fn shutdown(&self) {
        self.hooks().on_shutdown(self).await;

        let connections = self.inner.coordinator.atomic_drain().await;
        let count = connections.len();

        for connection in connections {
            connection.cancel_token().cancel();
            connection.tasks().close();
            if let Err(e) = connection.close().await {
                tracing::debug!("Failed to close socket [{}]: {}", connection.id, e);
            }
        }

        tracing::info!("Broker shut down, closed {} connections", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use crate::testutil::{Event, RecordingHooks, RecordingSink};
    use wstd_protocol::{AuthorizeRequest, TunnelId, Value};

    fn request(intent: &[&str]) -> AuthorizeRequest {
        AuthorizeRequest {
            info: Value::Nil,
            intent: intent.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_attach_and_queries() {
        let broker = Broker::new(Transport::Json, NoopHooks);
        let (sink, _frames) = RecordingSink::new();
        let conn = broker
            .attach_connection("/", Some("127.0.0.1:9000".parse().unwrap()), sink)
            .await;

        assert_eq!(broker.connection_count(), 1);
        let stored = broker.coordinator().connections.get(&conn).unwrap();
        assert_eq!(stored.path, "/");
        assert_eq!(stored.peer_addr.unwrap().port(), 9000);

        let outcome = broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&["sensor"]))
            .await
            .unwrap();

        let info = broker.get_client(&outcome.client_id).unwrap();
        assert_eq!(info.intent, vec!["sensor".to_string()]);
        assert_eq!(broker.list_clients(false).len(), 1);
        assert!(broker.list_tunnel_controllers().is_empty());
        assert!(broker.get_client(&ClientId::new("missing")).is_none());
    }

    #[tokio::test]
    async fn test_detach_fires_one_hook_per_client() {
        let hooks = RecordingHooks::new();
        let broker = Broker::with_hooks(Transport::Json, hooks.clone());
        let (sink, _frames) = RecordingSink::new();
        let conn = broker.attach_connection("/", None, sink).await;

        let controller = broker
            .authorize_client(&conn, TunnelId::CONTROLLER, request(&[]))
            .await
            .unwrap();
        let a = broker
            .authorize_client(&conn, TunnelId::new("t1"), request(&[]))
            .await
            .unwrap();
        let b = broker
            .authorize_client(&conn, TunnelId::new("t2"), request(&[]))
            .await
            .unwrap();
        assert_eq!(broker.client_count(true), 3);
        hooks.clear();

        broker.detach_connection(&conn).await;

        assert_eq!(broker.client_count(true), 0);
        assert_eq!(broker.connection_count(), 0);

        let events = hooks.events();
        assert_eq!(events.len(), 3);
        assert!(events.contains(&Event::ControllerDisconnected(controller.client_id)));
        assert!(events.contains(&Event::Disconnected(a.client_id)));
        assert!(events.contains(&Event::Disconnected(b.client_id)));

        // Second teardown is a no-op
        broker.detach_connection(&conn).await;
        assert_eq!(hooks.events().len(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let hooks = RecordingHooks::new();
        let broker = Broker::with_hooks(Transport::Json, hooks.clone());
        let (sink, _frames) = RecordingSink::new();
        let conn = broker.attach_connection("/", None, sink.clone()).await;
        broker
            .authorize_client(&conn, TunnelId::DIRECT, request(&[]))
            .await
            .unwrap();
        hooks.clear();

        broker.shutdown().await;

        assert!(sink.is_closed());
        assert_eq!(broker.connection_count(), 0);
        assert_eq!(broker.client_count(true), 0);
        assert_eq!(hooks.events(), vec![Event::Shutdown]);
    }
}
