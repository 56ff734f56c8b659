use dissent_core::DebateError;
use dissent_llm::LlmError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    #[error("No documents have been indexed")]
    EmptyCorpus,
    #[error("Dimension mismatch: expected {0}, got {1}")]
    DimensionMismatch(usize, usize),
    #[error("Similarity capability failed: {0}")]
    Capability(String),
}

impl From<LlmError> for RetrievalError {
    fn from(err: LlmError) -> Self {
        RetrievalError::Capability(err.to_string())
    }
}

impl From<RetrievalError> for DebateError {
    fn from(err: RetrievalError) -> Self {
        DebateError::Retrieval(err.to_string())
    }
}
