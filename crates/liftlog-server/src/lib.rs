//! HTTP API and SSE server for LiftLog.
//!
//! This crate provides the network surface of the workout coach: a chat
//! endpoint that streams the assistant's answer as server-sent events,
//! session management, per-client profile and settings, and workout record
//! queries.
//!
//! # Features
//!
//! - SSE streaming of chat answers
//! - Background persistence of completed turns (transcript, extraction, export)
//! - Cookie-identified client contexts
//! - Optional bearer-token authentication
//! - Request logging
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use liftlog_server::{AppState, Server, ServerConfig};
//!
//! let config = ServerConfig::new(None).with_bind_address("127.0.0.1:5000".parse()?);
//! let state = AppState::new(config, chat_backend, provisioner).with_store(store);
//! Server::from_state(state).run().await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod persona;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod worker;

pub use auth::{AuthError, auth_middleware};
pub use client::{CLIENT_COOKIE, client_middleware};
pub use config::ServerConfig;
pub use coordinator::{TurnEvent, stream_turn};
pub use error::{Result, ServerError};
pub use logging::request_logging_middleware;
pub use persona::build_system_prompt;
pub use pipeline::{CompletedTurn, PersistReport, TurnPersister};
pub use state::AppState;
pub use worker::{PoolConfig, WorkerPool};

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The LiftLog HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health routes (no auth required)
            .merge(routes::health_routes())
            .merge(self.api_routes())
            // Client token (every route sees one)
            .layer(middleware::from_fn(client::client_middleware))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                logging::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes. All of them require authentication when a token is configured.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            // Chat
            .route("/ask", get(routes::ask_handler))
            // Workout records
            .route(
                "/workout-stats",
                get(routes::list_workouts_handler).post(routes::add_workout_handler),
            )
            .route("/workout-stats/summary", get(routes::summary_handler))
            .route(
                "/workout-stats/exercise/{name}",
                get(routes::exercise_history_handler),
            )
            .route("/workout-stats/export", get(routes::export_handler))
            // Sessions
            .route(
                "/sessions",
                get(routes::list_sessions_handler).post(routes::create_session_handler),
            )
            .route(
                "/sessions/{id}",
                axum::routing::delete(routes::delete_session_handler),
            )
            .route(
                "/sessions/{id}/activate",
                post(routes::activate_session_handler),
            )
            .route("/sessions/{id}/rename", post(routes::rename_session_handler))
            .route(
                "/sessions/{id}/messages",
                get(routes::session_messages_handler),
            )
            .route("/current-session", get(routes::current_session_handler))
            // Client context
            .route(
                "/settings",
                get(routes::get_settings_handler).post(routes::save_settings_handler),
            )
            .route("/profile", post(routes::save_profile_handler))
            .route("/user-data", get(routes::user_data_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address();
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        self.run_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` resolves, then drain background jobs.
    pub async fn run_with_shutdown<S>(self, listener: TcpListener, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("Failed to read address: {}", e)))?;
        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        let grace = self.state.config.shutdown_grace;
        let discarded = self.state.workers.shutdown(grace).await;
        if discarded > 0 {
            warn!(discarded, "Background jobs discarded at shutdown");
        }
        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use liftlog_llm::{MockChatBackend, MockProvisioner};
    use tower::ServiceExt;

    fn server(config: ServerConfig) -> Server {
        Server::from_state(AppState::new(
            config,
            Arc::new(MockChatBackend::default()),
            Arc::new(MockProvisioner::new()),
        ))
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let app = server(ServerConfig::new(Some("test-token".to_string()))).router();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = server(ServerConfig::new(Some("test-token".to_string()))).router();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/settings")
                    .header(header::AUTHORIZATION, "Bearer test-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_new_client_gets_cookie() {
        let app = server(ServerConfig::default()).router();

        let response = app
            .oneshot(Request::builder().uri("/user-data").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("liftlog_client="));
    }

    #[tokio::test]
    async fn test_workout_routes_without_store() {
        let app = server(ServerConfig::default()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/workout-stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Database connection failed");
    }

    #[tokio::test]
    async fn test_run_with_shutdown_stops() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = server(ServerConfig::default());
        let workers = Arc::clone(&server.state().workers);

        server
            .run_with_shutdown(listener, async {})
            .await
            .unwrap();
        assert!(workers.is_shut_down());
    }

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new(Some("my-token".to_string()))
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_request_logging(true);

        assert_eq!(config.auth_token, Some("my-token".to_string()));
        assert_eq!(config.bind_address.port(), 9000);
        assert!(config.request_logging);
    }
}
