//! # Dissent Runtime
//!
//! Tokio-based debate orchestration: one [`Orchestrator`] run per debate
//! session, agents fanned out concurrently within a round, rounds strictly
//! sequential, every step streamed in order.

pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod session;
pub mod sink;

pub use config::DebateConfig;
pub use executor::{AgentExecutor, AgentOutcome, ExecutorConfig};
pub use orchestrator::Orchestrator;
pub use session::{DebateSession, DebateTranscript};
pub use sink::EventSink;
