//! Chat gateway server.
//!
//! Accepts WebSocket connections on `/api/v1/chats/{chat_id}/ws` and relays
//! chat frames between the members of each room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatgate-server
//! cargo run --bin chatgate-server -- --config gateway.toml --port 9000
//! CHATGATE_STORE__MODE=remote cargo run --bin chatgate-server
//! ```

use std::{path::PathBuf, sync::Arc};

use chatgate_server::{
    config::{GatewayConfig, StoreMode},
    domain::MessageStore,
    infrastructure::message_store::{
        ConnectionPool, InMemoryMessageStore, RemoteMessageStore, TcpDialer,
    },
    ui::{AppState, Server},
};
use chatgate_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatgate-server")]
#[command(about = "Real-time chat gateway", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host address to bind the server to (overrides configuration)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port number to bind the server to (overrides configuration)
    #[arg(short = 'p', long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize dependencies in order:
    // 1. MessageStore (and its connection pool in remote mode)
    // 2. AppState (registry, rate limiter, token verifier, use cases)
    // 3. Server
    let mut pool = None;
    let store: Arc<dyn MessageStore> = match config.store.mode {
        StoreMode::Memory => {
            tracing::info!("Using in-memory message store");
            Arc::new(InMemoryMessageStore::new())
        }
        StoreMode::Remote => {
            tracing::info!(address = %config.store.address, "Using remote message store");
            let remote_pool = Arc::new(ConnectionPool::new(
                TcpDialer::new(config.store.address.clone()),
                config.store.pool(),
            ));
            pool = Some(remote_pool.clone());
            Arc::new(RemoteMessageStore::new(
                remote_pool,
                config.store.request_timeout(),
            ))
        }
    };

    if config.auth.jwt_secret == "change-me" {
        tracing::warn!("auth.jwt_secret is the built-in default; set CHATGATE_AUTH__JWT_SECRET");
    }

    let server = Server::new(AppState::build(&config, store));
    let result = server.run(&config.server.host, config.server.port).await;

    if let Some(pool) = pool {
        pool.shutdown();
    }
    result
}
