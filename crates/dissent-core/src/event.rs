//! Step events, the append-only session log, and transport records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::document::DocId;
use crate::error::{DebateError, ErrorKind};
use crate::evidence::{AgentAssignment, AgentId, EvidenceSnippet};
use crate::response::{AgentResponse, AmbiguityAssessment, FinalAnswer};
use crate::stage::Stage;

/// Structured content attached to a step, enough to replay the round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepPayload {
    Snippets { snippets: Vec<EvidenceSnippet> },
    Assignment { assignment: AgentAssignment },
    Response { response: AgentResponse },
    Assessment { assessment: AmbiguityAssessment },
    Answer { answer: FinalAnswer },
}

/// One immutable, ordered record of pipeline progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Monotonic sequence number, starting at 1
    pub seq: u64,
    pub stage: Stage,
    pub speaker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<DocId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<StepPayload>,
    pub at: DateTime<Utc>,
}

/// A step before it is sequenced into a log
#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    pub stage: Stage,
    pub speaker: String,
    pub round: Option<u32>,
    pub agent_id: Option<AgentId>,
    pub doc_id: Option<DocId>,
    pub message: String,
    pub payload: Option<StepPayload>,
}

impl StepDraft {
    pub fn new(stage: Stage, speaker: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            speaker: speaker.into(),
            round: None,
            agent_id: None,
            doc_id: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn doc(mut self, doc_id: Option<DocId>) -> Self {
        self.doc_id = doc_id;
        self
    }

    pub fn payload(mut self, payload: StepPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Append-only event log owned by one session
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<StepEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence a draft and append it; returns the stored event
    pub fn push(&mut self, draft: StepDraft) -> &StepEvent {
        let event = StepEvent {
            seq: self.events.len() as u64 + 1,
            stage: draft.stage,
            speaker: draft.speaker,
            round: draft.round,
            agent_id: draft.agent_id,
            doc_id: draft.doc_id,
            message: draft.message,
            payload: draft.payload,
            at: Utc::now(),
        };
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.events.iter().map(|e| e.stage).collect()
    }

    pub fn into_events(self) -> Vec<StepEvent> {
        self.events
    }

    /// SHA-256 over the timestamp-free content of the log.
    ///
    /// Two runs over identical inputs with deterministic capabilities produce
    /// the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for event in &self.events {
            hasher.update(event.seq.to_le_bytes());
            hasher.update(event.stage.as_str().as_bytes());
            hasher.update(event.speaker.as_bytes());
            hasher.update(event.round.unwrap_or(0).to_le_bytes());
            hasher.update(event.agent_id.unwrap_or(0).to_le_bytes());
            hasher.update(event.doc_id.unwrap_or(0).to_le_bytes());
            hasher.update(event.message.as_bytes());
            if let Some(payload) = &event.payload {
                if let Ok(bytes) = serde_json::to_vec(payload) {
                    hasher.update(&bytes);
                }
            }
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Opaque run summary for observability consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateStats {
    pub documents: usize,
    pub chunks: usize,
    pub retrieved: usize,
    pub agents: usize,
    pub rounds: u32,
    pub rounds_executed: u32,
    pub degraded_responses: usize,
    pub model: String,
    pub retrieval_seconds: f64,
    /// Wall-clock milliseconds per stage
    pub stage_ms: BTreeMap<String, u64>,
    /// Fingerprint of the event log, see [`EventLog::digest`]
    pub log_digest: String,
}

/// Record delivered to transport consumers, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DebateMessage {
    Ready,
    Step {
        data: StepEvent,
    },
    Done {
        query: String,
        final_answer: FinalAnswer,
        stats: DebateStats,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
}

impl DebateMessage {
    pub fn error(err: &DebateError) -> Self {
        DebateMessage::Error {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DebateMessage::Done { .. } | DebateMessage::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sequences_monotonically() {
        let mut log = EventLog::new();
        log.push(StepDraft::new(Stage::Setup, "System", "Received 2 documents"));
        log.push(StepDraft::new(Stage::Indexing, "Indexer", "Indexed 2 chunks"));

        let seqs: Vec<u64> = log.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(log.stages(), vec![Stage::Setup, Stage::Indexing]);
    }

    #[test]
    fn test_digest_ignores_timestamps() {
        let build = || {
            let mut log = EventLog::new();
            log.push(StepDraft::new(Stage::Setup, "System", "hello").round(1));
            log
        };
        let a = build();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = build();
        assert_eq!(a.digest(), b.digest());

        let mut c = build();
        c.push(StepDraft::new(Stage::Indexing, "Indexer", "more"));
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_message_wire_format() {
        let ready = serde_json::to_value(DebateMessage::Ready).unwrap();
        assert_eq!(ready, serde_json::json!({"event": "ready"}));

        let err = DebateMessage::error(&DebateError::invalid("blank query"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["kind"], "input_validation");
        assert!(json["detail"].as_str().unwrap().contains("blank query"));
    }

    #[test]
    fn test_step_wire_format_omits_empty_fields() {
        let mut log = EventLog::new();
        let event = log
            .push(StepDraft::new(Stage::Debate, "Agent 1", "Answer: 1963").round(1).agent(1))
            .clone();
        let json = serde_json::to_value(DebateMessage::Step { data: event }).unwrap();
        assert_eq!(json["event"], "step");
        assert_eq!(json["data"]["stage"], "debate");
        assert_eq!(json["data"]["round"], 1);
        assert!(json["data"].get("doc_id").is_none());
    }
}
