//! Pipeline stages and the legal transition table
//!
//! ```text
//! setup -> indexing -> retrieval -> evidence -> {debate(r) -> ambiguity(r)}* -> synthesis -> done
//!                  any state -> error
//! ```
//!
//! Consecutive events of the same stage are units of work within one state
//! (for example one retrieval event per document) and are not transitions.

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Setup,
    Indexing,
    Retrieval,
    Evidence,
    Debate,
    Ambiguity,
    Synthesis,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Indexing => "indexing",
            Stage::Retrieval => "retrieval",
            Stage::Evidence => "evidence",
            Stage::Debate => "debate",
            Stage::Ambiguity => "ambiguity",
            Stage::Synthesis => "synthesis",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    /// Whether `self` may directly follow `prev` (`None` = session start)
    pub fn can_follow(&self, prev: Option<Stage>) -> bool {
        use Stage::*;
        match (prev, *self) {
            (Some(p), _) if p.is_terminal() => false,
            (_, Error) => true,
            (None, Setup) => true,
            (Some(Setup), Indexing) => true,
            (Some(Indexing), Retrieval) => true,
            (Some(Retrieval), Retrieval | Evidence) => true,
            (Some(Evidence), Evidence | Debate) => true,
            (Some(Debate), Debate | Ambiguity) => true,
            (Some(Ambiguity), Debate | Synthesis) => true,
            (Some(Synthesis), Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current stage and round of one session
#[derive(Debug, Clone, Default)]
pub struct StageMachine {
    current: Option<Stage>,
    round: u32,
}

impl StageMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Round of the current debate/ambiguity state; 0 before the first round
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_some_and(|s| s.is_terminal())
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: Stage) -> Result<(), DebateError> {
        if !next.can_follow(self.current) {
            return Err(DebateError::IllegalTransition {
                from: self.current,
                to: next,
            });
        }
        if next == Stage::Debate && self.current != Some(Stage::Debate) {
            self.round += 1;
        }
        self.current = Some(next);
        Ok(())
    }
}

/// Check that a sequence of stage tags is a legal path through the machine
pub fn is_legal_path(stages: &[Stage]) -> bool {
    let mut machine = StageMachine::new();
    stages.iter().all(|s| machine.advance(*s).is_ok())
}
