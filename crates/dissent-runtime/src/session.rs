//! Owned state of one debate session

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dissent_core::{
    AgentResponse, AmbiguityAssessment, DebateError, DebateStats, EventLog, FinalAnswer, Stage,
    StageMachine, StepDraft, StepEvent,
};
use dissent_llm::Timer;

/// Everything a finished debate produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTranscript {
    pub query: String,
    pub steps: Vec<StepEvent>,
    pub final_answer: FinalAnswer,
    pub stats: DebateStats,
}

impl DebateTranscript {
    pub fn stages(&self) -> Vec<Stage> {
        self.steps.iter().map(|s| s.stage).collect()
    }
}

/// Session state, owned by a single orchestrator run and discarded after it
#[derive(Debug)]
pub struct DebateSession {
    pub id: Uuid,
    machine: StageMachine,
    log: EventLog,
    rounds: Vec<Vec<AgentResponse>>,
    assessments: Vec<AmbiguityAssessment>,
    pub stats: DebateStats,
}

impl DebateSession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            machine: StageMachine::new(),
            log: EventLog::new(),
            rounds: Vec::new(),
            assessments: Vec::new(),
            stats: DebateStats {
                model: model.into(),
                ..DebateStats::default()
            },
        }
    }

    /// Advance the stage machine and append one event to the log
    pub fn record(&mut self, draft: StepDraft) -> Result<StepEvent, DebateError> {
        self.machine.advance(draft.stage)?;
        Ok(self.log.push(draft).clone())
    }

    pub fn stage(&self) -> Option<Stage> {
        self.machine.current()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_terminal()
    }

    pub fn add_round(&mut self, responses: Vec<AgentResponse>) {
        self.stats.rounds_executed += 1;
        self.stats.degraded_responses += responses.iter().filter(|r| r.is_degraded()).count();
        self.rounds.push(responses);
    }

    pub fn add_assessment(&mut self, assessment: AmbiguityAssessment) {
        self.assessments.push(assessment);
    }

    /// Public responses of all completed rounds, in round then agent order
    pub fn transcript(&self) -> Vec<AgentResponse> {
        self.rounds.iter().flatten().cloned().collect()
    }

    pub fn last_round(&self) -> Option<&[AgentResponse]> {
        self.rounds.last().map(Vec::as_slice)
    }

    pub fn last_assessment(&self) -> Option<&AmbiguityAssessment> {
        self.assessments.last()
    }

    /// Add a finished stage timer to the per-stage totals
    pub fn time(&mut self, timer: Timer) {
        *self
            .stats
            .stage_ms
            .entry(timer.name().to_string())
            .or_insert(0) += timer.elapsed_ms();
    }

    /// Fingerprint the log and hand back its events
    pub fn finish(self) -> (Vec<StepEvent>, DebateStats) {
        let mut stats = self.stats;
        stats.log_digest = self.log.digest();
        (self.log.into_events(), stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejects_illegal_transition() {
        let mut session = DebateSession::new("mock");
        session
            .record(StepDraft::new(Stage::Setup, "System", "ok"))
            .unwrap();
        let err = session
            .record(StepDraft::new(Stage::Synthesis, "Synthesizer", "too early"))
            .unwrap_err();
        assert!(matches!(err, DebateError::IllegalTransition { .. }));
        assert_eq!(session.stage(), Some(Stage::Setup));
    }

    #[test]
    fn test_rounds_accumulate_transcript() {
        let mut session = DebateSession::new("mock");
        session.add_round(vec![AgentResponse::degraded(1, vec![1], 1, "timeout")]);
        session.add_round(vec![AgentResponse::degraded(1, vec![1], 2, "timeout")]);

        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.stats.rounds_executed, 2);
        assert_eq!(session.stats.degraded_responses, 2);
        assert_eq!(session.last_round().unwrap()[0].round, 2);
    }
}
