//! Runtime configuration for debate sessions

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dissent_core::Limits;
use dissent_evidence::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, MAX_AGENTS};
use dissent_llm::ConfigError;

use crate::executor::ExecutorConfig;

/// Per-session behaviour of the orchestrator
#[derive(Debug, Clone)]
pub struct DebateConfig {
    /// Timeout and retry policy for agent calls
    pub executor: ExecutorConfig,
    /// Agent pool cap, clamped to 1..=3
    pub max_agents: usize,
    /// Capacity of the streaming event channel
    pub event_buffer: usize,
    /// Ask for clarification guidance before continuing a round
    pub ambiguity_guidance: bool,
    /// Ask for a narrated final answer
    pub narrate: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Request bounds enforced at setup
    pub limits: Limits,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            max_agents: MAX_AGENTS,
            event_buffer: 64,
            ambiguity_guidance: true,
            narrate: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            limits: Limits::default(),
        }
    }
}

fn parse<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} has invalid value '{}'", name, raw))),
        _ => Ok(default),
    }
}

fn flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            other => Err(ConfigError::Invalid(format!(
                "{} must be on/off, got '{}'",
                name, other
            ))),
        },
        Err(_) => Ok(default),
    }
}

impl DebateConfig {
    /// Load from `DISSENT_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_secs = parse(
            "DISSENT_COMPLETION_TIMEOUT_SECS",
            defaults.executor.timeout.as_secs(),
        )?;

        let config = Self {
            executor: ExecutorConfig {
                timeout: Duration::from_secs(timeout_secs),
                retries: parse("DISSENT_AGENT_RETRIES", defaults.executor.retries)?,
            },
            max_agents: parse("DISSENT_MAX_AGENTS", defaults.max_agents)?.clamp(1, MAX_AGENTS),
            event_buffer: parse("DISSENT_EVENT_BUFFER", defaults.event_buffer)?,
            ambiguity_guidance: flag("DISSENT_AMBIGUITY_GUIDANCE", defaults.ambiguity_guidance)?,
            narrate: flag("DISSENT_NARRATE", defaults.narrate)?,
            chunk_size: parse("DISSENT_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse("DISSENT_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            limits: defaults.limits,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "DISSENT_COMPLETION_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "DISSENT_EVENT_BUFFER must be positive".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "DISSENT_CHUNK_SIZE must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Deterministic configuration without optional LLM calls
    pub fn quiet() -> Self {
        Self {
            ambiguity_guidance: false,
            narrate: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DebateConfig::default();
        assert_eq!(config.max_agents, 3);
        assert_eq!(config.executor.retries, 1);
        assert_eq!(config.executor.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = DebateConfig::quiet();
        config.executor.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
