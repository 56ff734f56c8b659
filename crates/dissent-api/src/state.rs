//! Application State
//!
//! Centralizes access to the debate orchestrator and monitoring services.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use dissent_core::DebateRequest;
use dissent_llm::{global_metrics, LlmConfig, Metrics};
use dissent_runtime::{DebateConfig, Orchestrator};

use crate::error::ApiError;
use crate::sanitize::{sanitize_request, SanitizeConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    llm_config: Arc<LlmConfig>,
    orchestrator: Orchestrator,
    /// Orchestrators for per-request model overrides, built once per model so
    /// their circuit breaker is shared like the default one
    overrides: Arc<RwLock<HashMap<String, Orchestrator>>>,
    sanitize: Arc<SanitizeConfig>,
    metrics: Arc<Metrics>,
    ws_payload_timeout: Duration,
}

impl AppState {
    /// Build state from provider and debate configuration
    pub fn new(llm_config: LlmConfig, debate_config: DebateConfig) -> Result<Self, ApiError> {
        let orchestrator = Orchestrator::from_llm_config(&llm_config, debate_config, None)?;
        Ok(Self::with_orchestrator(llm_config, orchestrator))
    }

    /// Wrap an already-built orchestrator
    pub fn with_orchestrator(llm_config: LlmConfig, orchestrator: Orchestrator) -> Self {
        Self {
            llm_config: Arc::new(llm_config),
            orchestrator,
            overrides: Arc::new(RwLock::new(HashMap::new())),
            sanitize: Arc::new(SanitizeConfig::default()),
            metrics: global_metrics(),
            ws_payload_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_ws_payload_timeout(mut self, timeout: Duration) -> Self {
        self.ws_payload_timeout = timeout;
        self
    }

    /// Sanitize a raw request and pick the orchestrator that should run it.
    ///
    /// A model override runs on an orchestrator built from the shared
    /// provider configuration the first time that model is requested and
    /// reused afterwards; everything else reuses the default one.
    pub async fn prepare(
        &self,
        request: DebateRequest,
    ) -> Result<(Orchestrator, DebateRequest), ApiError> {
        let request = sanitize_request(request, &self.sanitize)?;
        let orchestrator = match request.model.as_deref() {
            Some(model) if model != self.orchestrator.model() => {
                self.override_orchestrator(model).await?
            }
            _ => self.orchestrator.clone(),
        };
        Ok((orchestrator, request))
    }

    async fn override_orchestrator(&self, model: &str) -> Result<Orchestrator, ApiError> {
        // Fast path: already built
        {
            let overrides = self.overrides.read().await;
            if let Some(orchestrator) = overrides.get(model) {
                return Ok(orchestrator.clone());
            }
        }

        let mut overrides = self.overrides.write().await;
        // Another request may have built it while we waited for the lock
        if let Some(orchestrator) = overrides.get(model) {
            return Ok(orchestrator.clone());
        }
        let orchestrator = Orchestrator::from_llm_config(
            &self.llm_config,
            self.orchestrator.config.clone(),
            Some(model),
        )?;
        tracing::info!(model, "Built orchestrator for model override");
        overrides.insert(model.to_string(), orchestrator.clone());
        Ok(orchestrator)
    }

    /// Models that currently have an override orchestrator, sorted
    pub async fn model_overrides(&self) -> Vec<String> {
        let mut models: Vec<String> = self.overrides.read().await.keys().cloned().collect();
        models.sort();
        models
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Get metrics collector (cloned Arc for sharing)
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn ws_payload_timeout(&self) -> Duration {
        self.ws_payload_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(LlmConfig::default(), DebateConfig::quiet()).unwrap()
    }

    fn request(model: Option<&str>) -> DebateRequest {
        let mut request = DebateRequest::new(vec!["Born in 1963."], "What year?");
        request.model = model.map(str::to_string);
        request
    }

    #[tokio::test]
    async fn test_default_model_uses_shared_orchestrator() {
        let state = state();
        state.prepare(request(None)).await.unwrap();
        let default_model = state.orchestrator().model().to_string();
        state.prepare(request(Some(&default_model))).await.unwrap();
        assert!(state.model_overrides().await.is_empty());
    }

    #[tokio::test]
    async fn test_model_override_is_built_once() {
        let state = state();
        for _ in 0..3 {
            state.prepare(request(Some("llama3"))).await.unwrap();
        }
        state.prepare(request(Some("mistral"))).await.unwrap();
        assert_eq!(state.model_overrides().await, vec!["llama3", "mistral"]);
    }

    #[tokio::test]
    async fn test_prepare_rejects_before_building() {
        let state = state();
        let bad = request(Some("llama3; rm -rf /"));
        assert!(matches!(
            state.prepare(bad).await,
            Err(ApiError::Validation(_))
        ));
        assert!(state.model_overrides().await.is_empty());
    }
}
