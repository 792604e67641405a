//! State coordinator for cross-collection atomicity
//!
//! The `StateCoordinator` owns the connection pool and the client registry
//! and puts both behind a single RwLock, so operations spanning the two
//! collections cannot be interleaved.
//!
//! # Atomicity Model
//!
//! Lookups (resolving a tunnel id to a client, listing clients) go straight
//! to the lock-free maps. Authorization, de-authorization, connection
//! teardown and shutdown take the write lock for the duration of their
//! registry mutations, and release it before any hook runs or any frame is
//! written.
//!
//! This prevents races such as:
//! - Two `_auth_` messages for the same tunnel id both creating a client
//! - A client authorizing on a connection while that connection is torn down
//! - Shutdown draining the registries while a teardown is half done

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use wstd_core::types::ConnectionId;
use wstd_protocol::TunnelId;

use crate::client::{ClientHandle, ClientRegistry};
use crate::connection::{ConnectionPool, SocketConnection};

/// Coordinates access to connections and clients with cross-collection atomicity.
///
/// For operations that need atomicity across both collections, acquire the write lock:
/// ```ignore
/// let _lock = coordinator.write().await;
/// conn.bind(tunnel_id, client.id.clone());
/// coordinator.clients.insert(client);
/// ```
pub struct StateCoordinator {
    /// RwLock for cross-collection atomicity; guards no data of its own
    inner: RwLock<()>,

    /// Live physical connections
    pub connections: Arc<ConnectionPool>,

    /// Authorized logical clients
    pub clients: Arc<ClientRegistry>,
}

impl StateCoordinator {
    /// Create a coordinator with empty registries
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(()),
            connections: Arc::new(ConnectionPool::new()),
            clients: Arc::new(ClientRegistry::new()),
        }
    }

    /// Acquire a read lock for a consistent view across both collections
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read().await
    }

    /// Acquire a write lock for exclusive cross-collection mutation
    pub async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().await
    }

    /// Add a freshly accepted connection
    pub fn register_connection(&self, connection: SocketConnection) -> Arc<SocketConnection> {
        self.connections.insert(connection)
    }

    /// Resolve the client bound to a tunnel id on a connection
    pub fn resolve(
        &self,
        connection: &SocketConnection,
        tunnel_id: &TunnelId,
    ) -> Option<Arc<ClientHandle>> {
        connection
            .client_for(tunnel_id)
            .and_then(|client_id| self.clients.get(&client_id))
    }

    /// Atomically remove a connection and every client it owns.
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - The removed connection, if it existed
    /// - Every client that was removed with it
    pub async fn atomic_disconnect(
        &self,
        connection_id: &ConnectionId,
    ) -> (Option<Arc<SocketConnection>>, Vec<Arc<ClientHandle>>) {
        let _lock = self.write().await;

        let Some(connection) = self.connections.remove(connection_id) else {
            return (None, Vec::new());
        };

        let clients = connection
            .client_ids()
            .iter()
            .filter_map(|client_id| self.clients.remove(client_id))
            .collect();

        (Some(connection), clients)
    }

    /// Atomically empty both registries.
    ///
    /// Returns every connection that was live.
    pub async fn atomic_drain(&self) -> Vec<Arc<SocketConnection>> {
        let _lock = self.write().await;
        let connections = self.connections.drain();
        self.clients.clear();
        connections
    }
}

impl Default for StateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
