//! # Dissent LLM
//!
//! Completion and embedding capabilities used by debate agents.
//!
//! ## Supported Backends
//!
//! | Provider | Type | Key Required |
//! |----------|------|--------------|
//! | OpenAI (or compatible) | API | `OPENAI_API_KEY` |
//! | Ollama | Local | None |
//! | Mock | Testing | None |
//!
//! ## Quick Start
//!
//! ```rust
//! use dissent_llm::{MockProvider, LlmProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Use mock provider for testing
//!     let llm = MockProvider::smart();
//!
//!     let response = llm.ask("What year was Michael Jordan born?").await.unwrap();
//!     println!("{}", response);
//! }
//! ```
//!
//! ## From the environment
//!
//! ```rust,ignore
//! use dissent_llm::LlmConfig;
//!
//! let config = LlmConfig::from_env()?;
//! let llm = config.completion_provider(None)?;
//! ```

pub mod config;
pub mod metrics;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod resilient_provider;

pub use config::{ConfigError, LlmConfig, ProviderKind, RetrieverKind};
pub use metrics::{global_metrics, Metrics, MetricsSnapshot, Timer};
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use provider::{EmbeddingProvider, LlmError, LlmProvider, LlmRequest, LlmResponse};
pub use resilient_provider::{CircuitState, CircuitStats, LlmCircuitConfig, ResilientProvider};
