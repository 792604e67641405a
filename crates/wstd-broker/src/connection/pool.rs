//! Connection pool implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use wstd_core::error::ConnectionError;
use wstd_core::traits::FrameSink;
use wstd_core::types::{ClientId, ConnectionId};
use wstd_protocol::{Frame, TunnelId};

/// Pool of live physical connections
pub struct ConnectionPool {
    /// Connections indexed by connection ID
    connections: DashMap<ConnectionId, Arc<SocketConnection>>,
}

/// A live physical connection and its multiplexing table
pub struct SocketConnection {
    /// Connection identifier
    pub id: ConnectionId,
    /// Request path the peer connected on
    pub path: String,
    /// Remote address, when known
    pub peer_addr: Option<SocketAddr>,
    /// Write half of the socket
    sink: Arc<dyn FrameSink>,
    /// Tunnel id -> logical client id
    tunnels: DashMap<TunnelId, ClientId>,
    /// Set once the first tunneled client authorizes; never cleared
    is_tunnel: AtomicBool,
    /// Cancels every dispatch unit spawned for this connection
    cancel: CancellationToken,
    /// Tracks in-flight dispatch units
    tasks: TaskTracker,
}

impl SocketConnection {
    /// Create a new connection with a fresh ID
    pub fn new(path: impl Into<String>, peer_addr: Option<SocketAddr>, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id: ConnectionId::generate(),
            path: path.into(),
            peer_addr,
            sink,
            tunnels: DashMap::new(),
            is_tunnel: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Whether this connection multiplexes tunneled clients
    pub fn is_tunnel(&self) -> bool {
        self.is_tunnel.load(Ordering::Acquire)
    }

    /// Promote the connection to tunnel mode
    pub(crate) fn mark_tunnel(&self) {
        self.is_tunnel.store(true, Ordering::Release);
    }

    /// Client registered under the given tunnel id
    pub fn client_for(&self, tunnel_id: &TunnelId) -> Option<ClientId> {
        self.tunnels.get(tunnel_id).map(|r| r.value().clone())
    }

    /// Register a client under a tunnel id
    pub(crate) fn bind(&self, tunnel_id: TunnelId, client_id: ClientId) {
        self.tunnels.insert(tunnel_id, client_id);
    }

    /// Remove the client registered under a tunnel id
    pub(crate) fn unbind(&self, tunnel_id: &TunnelId) -> Option<ClientId> {
        self.tunnels.remove(tunnel_id).map(|(_, client_id)| client_id)
    }

    /// IDs of every client on this connection
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.tunnels.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of clients on this connection
    pub fn client_count(&self) -> usize {
        self.tunnels.len()
    }

    /// Write a frame to the socket
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError> {
        self.sink.send_frame(frame).await
    }

    /// Close the socket
    pub async fn close(&self) -> Result<(), ConnectionError> {
        self.sink.close().await
    }

    /// Cancellation token shared by this connection's dispatch units
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Tracker for this connection's dispatch units
    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Number of dispatch units still running
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }
}

impl ConnectionPool {
    /// Create a new empty connection pool
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection
    pub fn insert(&self, connection: SocketConnection) -> Arc<SocketConnection> {
        let connection = Arc::new(connection);
        self.connections
            .insert(connection.id.clone(), Arc::clone(&connection));
        connection
    }

    /// Get a connection by ID
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<SocketConnection>> {
        self.connections.get(id).map(|r| Arc::clone(&r))
    }

    /// Remove a connection by ID
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<SocketConnection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Remove every connection
    pub fn drain(&self) -> Vec<Arc<SocketConnection>> {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|r| r.key().clone()).collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// List all connections
    pub fn list(&self) -> Vec<Arc<SocketConnection>> {
        self.connections.iter().map(|r| Arc::clone(&r)).collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}
