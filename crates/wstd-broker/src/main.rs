//! wstd broker daemon
//!
//! Runs a standalone broker with an `echo/` method and lifecycle logging.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wstd_broker::{ApiRouter, AutoResponse, Broker, BrokerServer, MethodCall};
use wstd_core::config::{self, BrokerConfig};
use wstd_core::types::{ClientId, ClientInfo};
use wstd_protocol::Transport;

#[derive(Parser)]
#[command(name = "wstd-broker")]
#[command(about = "wstd topic pub/sub broker")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "WSTD_PORT")]
    port: Option<u16>,

    /// Only accept connections from localhost
    #[arg(long)]
    local: bool,

    /// Wire encoding: msgpack or json (overrides config)
    #[arg(short, long)]
    transport: Option<Transport>,

    /// Trace every message sent and received
    #[arg(short, long)]
    debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<BrokerConfig> {
    if let Some(config_path) = &args.config {
        return config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            eprintln!("Failed to load config from {:?}: {}", default_path, e);
            BrokerConfig::default()
        }))
    } else {
        Ok(BrokerConfig::default())
    }
}

fn router() -> ApiRouter {
    let mut router = ApiRouter::new();
    router
        .method("echo/", |call: MethodCall| async move {
            Some(AutoResponse::reply(call.data))
        })
        .on_client_connected(|_broker: Broker, client_id: ClientId| async move {
            tracing::info!("Client connected: {}", client_id);
        })
        .on_client_authorized(|_broker: Broker, client: ClientInfo| async move {
            tracing::info!("Client authorized: {} as {:?}", client.id, client.intent);
        })
        .on_client_disconnected(|_broker: Broker, client_id: ClientId| async move {
            tracing::info!("Client disconnected: {}", client_id);
        })
        .on_tunnel_controller_connected(|_broker: Broker, client_id: ClientId| async move {
            tracing::info!("Tunnel controller connected: {}", client_id);
        })
        .on_tunnel_controller_disconnected(|_broker: Broker, client_id: ClientId| async move {
            tracing::info!("Tunnel controller disconnected: {}", client_id);
        })
        .on_unhandled(|call: MethodCall| async move {
            tracing::debug!("Unhandled message {} from {}", call.topic, call.client_id);
            None
        });
    router
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration and apply overrides
    let mut config = load_config(&args)?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.local {
        config.allow_remote_connect = false;
    }
    if let Some(transport) = args.transport {
        config.transport = transport;
    }
    config.debug |= args.debug;

    // Initialize logging
    let log_level = if config.debug { "debug" } else { args.log_level.as_str() };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("wstd broker starting ({} transport)...", config.transport);

    let broker = Broker::from_config(&config, router());
    let cancel = CancellationToken::new();

    // Setup signal handlers
    let shutdown_broker = broker.clone();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown_broker.shutdown().await;
        shutdown_cancel.cancel();
    });

    let bind_addr = config.bind_address();
    let server = BrokerServer::new(broker, cancel);
    server.run(&bind_addr).await?;

    tracing::info!("Broker shutdown complete");
    Ok(())
}
