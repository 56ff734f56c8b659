//! User-supplied documents, the query, and request validation

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// 1-based document identifier
pub type DocId = u32;

/// An immutable document submitted for one debate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

impl Document {
    pub fn new(id: DocId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Label used in prompts and event messages
    pub fn label(&self) -> String {
        format!("Doc {}", self.id)
    }
}

/// The user's question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounds applied to incoming requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_documents: usize,
    pub max_rounds: u32,
    pub max_top_k: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_documents: 4,
            max_rounds: 4,
            max_top_k: 20,
        }
    }
}

pub const DEFAULT_ROUNDS: u32 = 2;
pub const DEFAULT_TOP_K: usize = 6;

fn default_rounds() -> u32 {
    DEFAULT_ROUNDS
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Raw debate request as received from a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRequest {
    pub documents: Vec<String>,
    pub query: String,
    /// Optional model override for the completion capability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
}

impl DebateRequest {
    pub fn new<S: Into<String>>(documents: Vec<S>, query: impl Into<String>) -> Self {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
            query: query.into(),
            model: None,
            top_k: DEFAULT_TOP_K,
            rounds: DEFAULT_ROUNDS,
        }
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sanitize and bound-check the request.
    ///
    /// Documents are trimmed, blanks are dropped and exact duplicates collapse to
    /// their first occurrence; ids are assigned 1..=n in submission order.
    pub fn validate(&self, limits: &Limits) -> Result<ValidatedRequest, DebateError> {
        let mut texts: Vec<&str> = Vec::new();
        for doc in &self.documents {
            let trimmed = doc.trim();
            if !trimmed.is_empty() && !texts.contains(&trimmed) {
                texts.push(trimmed);
            }
        }

        if texts.is_empty() {
            return Err(DebateError::invalid(
                "At least one non-empty document is required.",
            ));
        }
        if texts.len() > limits.max_documents {
            return Err(DebateError::invalid(format!(
                "Too many documents: {} (max {})",
                texts.len(),
                limits.max_documents
            )));
        }

        let query = self.query.trim();
        if query.is_empty() {
            return Err(DebateError::invalid("Query must not be blank."));
        }
        if self.rounds == 0 || self.rounds > limits.max_rounds {
            return Err(DebateError::invalid(format!(
                "rounds must be between 1 and {}, got {}",
                limits.max_rounds, self.rounds
            )));
        }
        if self.top_k == 0 || self.top_k > limits.max_top_k {
            return Err(DebateError::invalid(format!(
                "top_k must be between 1 and {}, got {}",
                limits.max_top_k, self.top_k
            )));
        }

        let documents = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document::new(i as DocId + 1, text))
            .collect();

        Ok(ValidatedRequest {
            documents,
            query: Query(query.to_string()),
            model: self.model.clone().filter(|m| !m.trim().is_empty()),
            top_k: self.top_k,
            rounds: self.rounds,
        })
    }
}

/// A request that passed validation; the only input the pipeline accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub documents: Vec<Document>,
    pub query: Query,
    pub model: Option<String>,
    pub top_k: usize,
    pub rounds: u32,
}

impl ValidatedRequest {
    /// Agent pool size: one agent per document, at most `max_agents`
    pub fn agent_count(&self, max_agents: usize) -> usize {
        self.documents.len().min(max_agents.max(1))
    }
}
