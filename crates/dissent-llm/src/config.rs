//! Provider configuration
//!
//! Handles API keys, provider selection and model names.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;

use crate::mock::MockProvider;
use crate::ollama::{self, OllamaProvider};
use crate::openai::{self, OpenAIProvider};
use crate::provider::{EmbeddingProvider, LlmProvider};
use crate::resilient_provider::ResilientProvider;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which completion backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    OpenAI,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "openai" => Ok(ProviderKind::OpenAI),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(ConfigError::Invalid(format!("unknown provider '{}'", other))),
        }
    }
}

/// How evidence snippets are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieverKind {
    /// Term-frequency cosine; deterministic and offline
    Lexical,
    /// Cosine over provider embeddings
    Embedding,
}

impl FromStr for RetrieverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(RetrieverKind::Lexical),
            "embedding" => Ok(RetrieverKind::Embedding),
            other => Err(ConfigError::Invalid(format!("unknown retriever '{}'", other))),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Completion backend (env: DISSENT_PROVIDER)
    pub provider: ProviderKind,
    /// Default chat model (env: DISSENT_MODEL)
    pub model: String,
    /// Embedding model (env: DISSENT_EMBEDDING_MODEL)
    pub embedding_model: Option<String>,
    /// OpenAI API key (env: OPENAI_API_KEY)
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL (env: OPENAI_BASE_URL)
    pub openai_base_url: String,
    /// Ollama base URL (env: OLLAMA_URL)
    pub ollama_url: String,
    /// Snippet ranking (env: DISSENT_RETRIEVER)
    pub retriever: RetrieverKind,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            model: "smart-mock".to_string(),
            embedding_model: None,
            openai_api_key: None,
            openai_base_url: openai::DEFAULT_BASE_URL.to_string(),
            ollama_url: ollama::DEFAULT_URL.to_string(),
            retriever: RetrieverKind::Lexical,
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match var("DISSENT_PROVIDER") {
            Some(v) => v.parse()?,
            None => ProviderKind::Mock,
        };
        let model = var("DISSENT_MODEL").unwrap_or_else(|| match provider {
            ProviderKind::Mock => "smart-mock".to_string(),
            ProviderKind::OpenAI => openai::DEFAULT_CHAT_MODEL.to_string(),
            ProviderKind::Ollama => "llama3".to_string(),
        });
        let retriever = match var("DISSENT_RETRIEVER") {
            Some(v) => v.parse()?,
            None => RetrieverKind::Lexical,
        };

        let config = Self {
            provider,
            model,
            embedding_model: var("DISSENT_EMBEDDING_MODEL"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
            ollama_url: var("OLLAMA_URL").unwrap_or_else(|| ollama::DEFAULT_URL.to_string()),
            retriever,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the selected provider has what it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == ProviderKind::OpenAI && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()));
        }
        Ok(())
    }

    fn openai(&self) -> Result<OpenAIProvider, ConfigError> {
        let key = self
            .openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;
        let mut provider = OpenAIProvider::new(key, &self.model).with_base_url(&self.openai_base_url);
        if let Some(model) = &self.embedding_model {
            provider = provider.with_embedding_model(model);
        }
        Ok(provider)
    }

    fn ollama(&self) -> OllamaProvider {
        let provider = OllamaProvider::with_url(&self.ollama_url, &self.model);
        match &self.embedding_model {
            Some(model) => provider.with_embedding_model(model),
            None => provider,
        }
    }

    /// Build the completion provider, optionally overriding the model.
    ///
    /// Real backends are wrapped in a circuit breaker.
    pub fn completion_provider(
        &self,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        let provider: Arc<dyn LlmProvider> = match self.provider {
            ProviderKind::Mock => Arc::new(MockProvider::smart()),
            ProviderKind::OpenAI => {
                let base = self.openai()?;
                let provider = match model {
                    Some(m) => base.with_model(m),
                    None => base,
                };
                Arc::new(ResilientProvider::wrap(Arc::new(provider)))
            }
            ProviderKind::Ollama => {
                let base = self.ollama();
                let provider = match model {
                    Some(m) => base.with_model(m),
                    None => base,
                };
                Arc::new(ResilientProvider::wrap(Arc::new(provider)))
            }
        };
        Ok(provider)
    }

    /// Build the embedding provider when embedding retrieval is selected
    pub fn embedding_provider(&self) -> Result<Option<Arc<dyn EmbeddingProvider>>, ConfigError> {
        if self.retriever == RetrieverKind::Lexical {
            return Ok(None);
        }
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            ProviderKind::Mock => Arc::new(MockProvider::smart()),
            ProviderKind::OpenAI => Arc::new(self.openai()?),
            ProviderKind::Ollama => Arc::new(self.ollama()),
        };
        Ok(Some(provider))
    }

    /// Check if a provider is configured
    pub fn is_configured(&self, provider: ProviderKind) -> bool {
        match provider {
            ProviderKind::OpenAI => self.openai_api_key.is_some(),
            ProviderKind::Ollama | ProviderKind::Mock => true,
        }
    }
}
