//! Client registry implementation

use dashmap::DashMap;
use std::sync::Arc;

use wstd_core::types::{ClientId, ClientInfo, ConnectionId};
use wstd_protocol::{TunnelId, Value};

/// Every authorized logical client, across all connections
pub struct ClientRegistry {
    /// Clients indexed by client ID
    clients: DashMap<ClientId, Arc<ClientHandle>>,
}

/// An authorized logical client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientHandle {
    /// Client ID
    pub id: ClientId,
    /// Connection that owns this client
    pub connection_id: ConnectionId,
    /// Tunnel id on the owning connection
    pub tunnel_id: TunnelId,
    /// Capability tags
    pub intent: Vec<String>,
    /// Opaque metadata supplied at authorization
    pub info: Value,
}

impl ClientHandle {
    /// Whether this client is the tunnel controller of its connection
    pub fn is_tunnel_controller(&self) -> bool {
        self.tunnel_id.is_controller()
    }

    /// Whether the client matches an intent filter (no filter matches all)
    pub fn matches_intent(&self, filter: Option<&str>) -> bool {
        match filter {
            None => true,
            Some(tag) => self.intent.iter().any(|t| t == tag),
        }
    }

    /// Public view of this client
    pub fn to_info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id.clone(),
            intent: self.intent.clone(),
            info: self.info.clone(),
        }
    }
}

impl ClientRegistry {
    /// Create a new client registry
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Draw a client ID not used by any registered client
    pub fn allocate_id(&self) -> ClientId {
        loop {
            let id = ClientId::generate();
            if !self.clients.contains_key(&id) {
                return id;
            }
        }
    }

    /// Add or replace a client
    pub fn insert(&self, client: ClientHandle) -> Arc<ClientHandle> {
        let client = Arc::new(client);
        self.clients.insert(client.id.clone(), Arc::clone(&client));
        client
    }

    /// Get a client by ID
    pub fn get(&self, id: &ClientId) -> Option<Arc<ClientHandle>> {
        self.clients.get(id).map(|r| Arc::clone(&r))
    }

    /// Remove a client by ID
    pub fn remove(&self, id: &ClientId) -> Option<Arc<ClientHandle>> {
        self.clients.remove(id).map(|(_, client)| client)
    }

    /// List clients, optionally including tunnel controllers
    pub fn list(&self, include_controllers: bool) -> Vec<Arc<ClientHandle>> {
        self.clients
            .iter()
            .filter(|r| include_controllers || !r.is_tunnel_controller())
            .map(|r| Arc::clone(&r))
            .collect()
    }

    /// List tunnel controllers only
    pub fn list_controllers(&self) -> Vec<Arc<ClientHandle>> {
        self.clients
            .iter()
            .filter(|r| r.is_tunnel_controller())
            .map(|r| Arc::clone(&r))
            .collect()
    }

    /// Count clients, optionally including tunnel controllers
    pub fn count(&self, include_controllers: bool) -> usize {
        if include_controllers {
            self.clients.len()
        } else {
            self.clients
                .iter()
                .filter(|r| !r.is_tunnel_controller())
                .count()
        }
    }

    /// Remove every client
    pub fn clear(&self) {
        self.clients.clear();
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
