//! # Dissent API
//!
//! HTTP and WebSocket transport for document debates.
//!
//! - `POST /api/debate` runs a debate and returns the whole transcript
//! - `GET /ws/debate` streams `ready`, each step and a terminal record
//! - `GET /health`, `GET /api/metrics`, `GET /metrics`, `GET /api-docs/openapi.json`

pub mod error;
pub mod middleware;
pub mod routes;
pub mod sanitize;
pub mod server;
pub mod state;
pub mod ws;

pub use error::{ApiError, ApiResult};
pub use server::{init_tracing, DissentServer, ServerConfig};
pub use state::AppState;
