//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Chat gateway server
///
/// # Example
///
/// ```ignore
/// let state = AppState::build(&config, store);
/// Server::new(state).run("127.0.0.1", 8083).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/api/v1/chats/{chat_id}/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Chat gateway listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/api/v1/chats/<chat_id>/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
