//! Agent responses, ambiguity assessments and the final answer

use serde::{Deserialize, Serialize};

use crate::document::DocId;
use crate::evidence::AgentId;

/// A reference from a claim into the agent's assigned evidence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: DocId,
    pub rank: u32,
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}#{}", self.doc_id, self.rank)
    }
}

/// An assertion by one agent that another agent's evidence is wrong or inapplicable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub target_agent: AgentId,
    pub reason: String,
}

/// Whether a response carries a usable claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseStatus {
    Answered,
    /// The agent found no answer in its evidence
    Abstained,
    /// The completion failed even after retry; the claim is empty
    Degraded { failure: String },
}

/// One agent's contribution to one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: AgentId,
    pub doc_ids: Vec<DocId>,
    pub round: u32,
    /// Candidate answer value as stated by the agent
    pub answer: String,
    /// Supporting rationale
    pub explanation: String,
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disputes: Vec<Dispute>,
    #[serde(flatten)]
    pub status: ResponseStatus,
}

impl AgentResponse {
    /// Empty response recorded when the agent could not produce one
    pub fn degraded(
        agent_id: AgentId,
        doc_ids: Vec<DocId>,
        round: u32,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            doc_ids,
            round,
            answer: String::new(),
            explanation: String::new(),
            citations: Vec::new(),
            disputes: Vec::new(),
            status: ResponseStatus::Degraded {
                failure: failure.into(),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ResponseStatus::Degraded { .. })
    }

    /// True if the response carries a non-empty candidate answer
    pub fn has_claim(&self) -> bool {
        self.status == ResponseStatus::Answered && !self.answer.trim().is_empty()
    }

    /// Claim text as shown in transcripts
    pub fn claim(&self) -> String {
        match &self.status {
            ResponseStatus::Degraded { failure } => format!("[no response: {}]", failure),
            _ if self.explanation.is_empty() => format!("Answer: {}", self.answer),
            _ => format!("Answer: {}. Explanation: {}", self.answer, self.explanation),
        }
    }
}

/// Outcome class of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ResolvedSingle,
    ResolvedMulti,
    UnresolvedConflict,
}

impl Classification {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Classification::UnresolvedConflict)
    }
}

/// Why a debate stopped or continued after a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Stop(StopReason),
}

impl Decision {
    pub fn is_stop(&self) -> bool {
        matches!(self, Decision::Stop(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Classification was resolved-single or resolved-multi
    Resolved,
    /// The configured round cap was reached
    RoundLimit,
    /// The candidate answer set did not change versus the previous round
    NoNewInformation,
}

/// Ambiguity Solver verdict for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguityAssessment {
    pub round: u32,
    pub classification: Classification,
    pub rationale: String,
    pub decision: Decision,
    /// Normalized candidate answer values seen this round, sorted
    pub candidate_answers: Vec<String>,
    /// Clarification guidance for the next round, if any was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// One surviving answer with its support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    /// Answer value as first stated by a supporting agent
    pub value: String,
    /// Normalized equivalence key shared by the group
    pub key: String,
    pub supporting_agents: Vec<AgentId>,
    pub citations: Vec<Citation>,
    /// Validity / confidence note
    pub note: String,
}

/// Flag attached to an answer group when the debate ended unresolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disagreement {
    /// Answer key the flag applies to
    pub answer: String,
    /// Agents backing the flagged answer
    pub agents: Vec<AgentId>,
    /// Agents that asserted this answer's evidence is wrong or inapplicable
    pub disputed_by: Vec<AgentId>,
    /// The specific contradiction text
    pub detail: String,
}

/// Terminal synthesized result of a debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub answers: Vec<AnswerEntry>,
    pub disagreements: Vec<Disagreement>,
    pub classification: Classification,
    /// Agents that found no answer in their evidence in the final round
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abstained: Vec<AgentId>,
    pub summary: String,
}

impl FinalAnswer {
    pub fn is_ambiguous(&self) -> bool {
        self.answers.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_response_has_no_claim() {
        let resp = AgentResponse::degraded(2, vec![2], 1, "timeout");
        assert!(resp.is_degraded());
        assert!(!resp.has_claim());
        assert_eq!(resp.claim(), "[no response: timeout]");
    }

    #[test]
    fn test_status_flattens_into_response() {
        let resp = AgentResponse::degraded(1, vec![1], 1, "boom");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["failure"], "boom");
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(Decision::Stop(StopReason::NoNewInformation)).unwrap();
        assert_eq!(json, serde_json::json!({"stop": "no_new_information"}));
        assert!(Decision::Stop(StopReason::RoundLimit).is_stop());
        assert!(!Decision::Continue.is_stop());
    }
}
