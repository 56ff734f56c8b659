//! Session-level error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::Stage;

/// Machine-readable category of a terminal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    AllAgentsFailure,
    RetrievalFailure,
    SynthesisFailure,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::InputValidation | ErrorKind::Internal)
    }
}

/// Errors that terminate a debate session
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DebateError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("All {agents} agents failed in round {round}: {}", failures.join("; "))]
    AllAgentsFailed {
        round: u32,
        agents: usize,
        failures: Vec<String>,
    },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Debate cancelled")]
    Cancelled,

    #[error("Illegal stage transition: {from:?} -> {to:?}")]
    IllegalTransition { from: Option<Stage>, to: Stage },
}

impl DebateError {
    /// Category used in the terminal error record
    pub fn kind(&self) -> ErrorKind {
        match self {
            DebateError::InputValidation(_) => ErrorKind::InputValidation,
            DebateError::AllAgentsFailed { .. } => ErrorKind::AllAgentsFailure,
            DebateError::Retrieval(_) => ErrorKind::RetrievalFailure,
            DebateError::Synthesis(_) => ErrorKind::SynthesisFailure,
            DebateError::Cancelled => ErrorKind::Cancelled,
            DebateError::IllegalTransition { .. } => ErrorKind::Internal,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        DebateError::InputValidation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DebateError::invalid("blank query").kind(),
            ErrorKind::InputValidation
        );
        let err = DebateError::AllAgentsFailed {
            round: 2,
            agents: 3,
            failures: vec!["timeout".into(), "timeout".into(), "bad json".into()],
        };
        assert_eq!(err.kind(), ErrorKind::AllAgentsFailure);
        assert!(err.to_string().contains("round 2"));
        assert!(!ErrorKind::InputValidation.is_retryable());
        assert!(ErrorKind::RetrievalFailure.is_retryable());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AllAgentsFailure).unwrap();
        assert_eq!(json, "\"all_agents_failure\"");
    }
}
