//! Retrieved evidence and agent bindings

use serde::{Deserialize, Serialize};

use crate::document::DocId;

/// 1-based debate agent index
pub type AgentId = u32;

/// A ranked excerpt of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    pub doc_id: DocId,
    /// 1-based rank within its document for the current query
    pub rank: u32,
    pub score: f32,
    /// Character offset of the span in the source document
    pub start: usize,
    pub text: String,
}

impl EvidenceSnippet {
    /// Stable reference used in citations, e.g. `D2#1`
    pub fn reference(&self) -> String {
        format!("D{}#{}", self.doc_id, self.rank)
    }
}

/// Binding of one agent to its documents and their snippets for a whole debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssignment {
    pub agent_id: AgentId,
    /// Documents represented by this agent, ascending
    pub doc_ids: Vec<DocId>,
    /// Snippets in prompt order; citation indices point into this list (1-based)
    pub snippets: Vec<EvidenceSnippet>,
}

impl AgentAssignment {
    pub fn speaker(&self) -> String {
        format!("Agent {}", self.agent_id)
    }

    /// First bound document, used as the agent's primary source
    pub fn primary_doc(&self) -> Option<DocId> {
        self.doc_ids.first().copied()
    }

    /// Look up a snippet by its 1-based prompt index
    pub fn snippet(&self, index: usize) -> Option<&EvidenceSnippet> {
        index.checked_sub(1).and_then(|i| self.snippets.get(i))
    }
}
