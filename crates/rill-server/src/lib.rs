//! Rill playground server.
//!
//! Serves the playground core over WebSocket. Each connection is one editor
//! instance with its own compile queue and session.
//!
//! - **Protocol**: client/server message types
//! - **Connection**: per-editor controller and message handling
//! - **Routes**: HTTP and WebSocket handlers

pub mod connection;
pub mod error;
pub mod protocol;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use rill_playground::{PlaygroundConfig, ShareLinks};

pub use connection::Connection;
pub use error::{ServerError, ServerResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use routes::create_router;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    /// Configuration for every connection's playground.
    pub playground: PlaygroundConfig,
    /// Share link builder, shared by all connections.
    pub share: ShareLinks,
}

impl AppState {
    pub fn new(playground: PlaygroundConfig) -> Self {
        let share = ShareLinks::new(playground.share.clone());
        Self { playground, share }
    }
}

/// Start the server and run until Ctrl+C.
pub async fn serve(config: ServerConfig, playground: PlaygroundConfig) -> ServerResult<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", config.host, config.port)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting Rill playground server at http://{}", addr);

    // Handle Ctrl+C for graceful shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    serve_on(listener, playground, async move {
        let _ = shutdown_rx.await;
    })
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    playground: PlaygroundConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    let app = create_router(Arc::new(AppState::new(playground)));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
