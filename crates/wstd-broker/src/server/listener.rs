//! WebSocket listener
//!
//! Accepts incoming connections and spawns a handler for each client.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::broker::Broker;
use crate::server::handler::handle_connection;

/// WebSocket server that feeds accepted connections into a [`Broker`]
pub struct BrokerServer {
    /// Shared broker
    broker: Broker,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl BrokerServer {
    /// Create a new server
    pub fn new(broker: Broker, cancel: CancellationToken) -> Self {
        Self { broker, cancel }
    }

    /// The broker this server feeds
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Bind to `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        self.broker.start().await;

        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.accept_loop(listener).await
    }

    /// Serve an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.broker.start().await;
        self.accept_loop(listener).await
    }

    async fn accept_loop(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .context("Failed to read listener address")?;
        tracing::info!("Broker listening on {}", local_addr);

        loop {
            tokio::select! {
                // Check for shutdown
                _ = self.cancel.cancelled() => {
                    tracing::info!("Broker listener shutting down");
                    break;
                }

                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn a handler task for an accepted connection
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::debug!("New connection from {}", peer_addr);

        let broker = self.broker.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(handle_connection(socket, peer_addr, broker, cancel));
    }
}
