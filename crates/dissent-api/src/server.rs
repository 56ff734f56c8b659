//! Dissent API server with graceful shutdown

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;

use dissent_llm::LlmConfig;
use dissent_runtime::DebateConfig;

use crate::error::ApiError;
use crate::middleware::{
    body_limit_layer, cors_layer, request_id_middleware, security_headers_middleware,
    timeout_layer, tracing_middleware,
};
use crate::routes::api_router;
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Request timeout; a blocking debate must finish within it
    pub timeout: Duration,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// How long a WebSocket client has to send its request
    pub ws_payload_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            timeout: Duration::from_secs(300),
            max_body_size: 1024 * 1024, // 1MB
            ws_payload_timeout: Duration::from_secs(5),
        }
    }
}

fn env_parse<T: std::str::FromStr>(names: &[&str]) -> Option<T> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port: u16 = env_parse(&["DISSENT_PORT", "PORT"]).unwrap_or(defaults.addr.port());
        let timeout_secs: u64 =
            env_parse(&["DISSENT_TIMEOUT_SECS"]).unwrap_or(defaults.timeout.as_secs());
        let max_body_size: usize =
            env_parse(&["DISSENT_MAX_BODY_BYTES"]).unwrap_or(defaults.max_body_size);
        let ws_secs: u64 = env_parse(&["DISSENT_WS_PAYLOAD_TIMEOUT_SECS"])
            .unwrap_or(defaults.ws_payload_timeout.as_secs());

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            max_body_size,
            ws_payload_timeout: Duration::from_secs(ws_secs.max(1)),
        }
    }
}

/// Dissent API server
pub struct DissentServer {
    config: ServerConfig,
    app_state: AppState,
}

impl DissentServer {
    /// Create a new server from provider and debate configuration
    pub fn new(
        config: ServerConfig,
        llm_config: LlmConfig,
        debate_config: DebateConfig,
    ) -> Result<Self, ApiError> {
        tracing::info!(
            provider = ?llm_config.provider,
            model = %llm_config.model,
            retriever = ?llm_config.retriever,
            "Initializing debate orchestrator"
        );
        let app_state = AppState::new(llm_config, debate_config)?;
        Ok(Self::with_state(config, app_state))
    }

    /// Create a server around prepared state
    pub fn with_state(config: ServerConfig, app_state: AppState) -> Self {
        let app_state = app_state.with_ws_payload_timeout(config.ws_payload_timeout);
        Self { config, app_state }
    }

    /// Get the configured router
    pub fn router(&self) -> Router {
        api_router(self.app_state.clone())
            // Order matters - bottom to top execution
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(body_limit_layer(self.config.max_body_size))
            .layer(timeout_layer(self.config.timeout))
            .layer(cors_layer())
            .layer(middleware::from_fn(tracing_middleware))
            .layer(middleware::from_fn(request_id_middleware))
    }

    /// Run the server with graceful shutdown
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Dissent API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dissent=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
