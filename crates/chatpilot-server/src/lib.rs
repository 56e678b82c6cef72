//! HTTP API and SSE streaming server for ChatPilot.
//!
//! # Routes
//!
//! - `POST /api/chat`: answer a question as a `text/event-stream`
//! - `GET /health`: liveness, version and model
//!
//! # Example
//!
//! ```ignore
//! use chatpilot_server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::new(orchestrator, ServerConfig::new());
//! Server::new(state).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use ratelimit::{create_rate_limiter, rate_limit_middleware, request_logging_middleware};
pub use routes::{ChatBody, HealthResponse, SESSION_HEADER};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The ChatPilot HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::chat_routes(self.state.clone()))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the configured address until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address();
        self.run_on(addr).await
    }

    /// Run the server on a specific address.
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.serve(addr, std::future::pending()).await
    }

    /// Run until `signal` resolves, then stop accepting and drain open streams.
    pub async fn run_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.bind_address();
        self.serve(addr, signal).await
    }

    async fn serve<F>(self, addr: SocketAddr, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;
        info!(address = %addr, "ChatPilot server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
