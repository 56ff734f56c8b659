//! # Dissent Core
//!
//! Core types shared by every Dissent crate:
//! - [`DebateRequest`] / [`ValidatedRequest`]: sanitized user input
//! - [`EvidenceSnippet`] / [`AgentAssignment`]: retrieved evidence bound to agents
//! - [`AgentResponse`], [`AmbiguityAssessment`], [`FinalAnswer`]: debate artifacts
//! - [`StageMachine`]: legal pipeline transitions
//! - [`EventLog`] / [`DebateMessage`]: the ordered audit trail and its wire records
//!
//! ## Quick Start
//!
//! ```rust
//! use dissent_core::{DebateRequest, Limits};
//!
//! let request = DebateRequest::new(
//!     vec!["Michael Jordan was born in 1963.", "  "],
//!     "What year was Michael Jordan born?",
//! );
//! let valid = request.validate(&Limits::default()).unwrap();
//! assert_eq!(valid.documents.len(), 1);
//! ```

pub mod document;
pub mod error;
pub mod event;
pub mod evidence;
pub mod response;
pub mod stage;

pub use document::{DebateRequest, DocId, Document, Limits, Query, ValidatedRequest};
pub use error::{DebateError, ErrorKind};
pub use event::{DebateMessage, DebateStats, EventLog, StepDraft, StepEvent, StepPayload};
pub use evidence::{AgentAssignment, AgentId, EvidenceSnippet};
pub use response::{
    AgentResponse, AmbiguityAssessment, AnswerEntry, Citation, Classification, Decision,
    Disagreement, Dispute, FinalAnswer, ResponseStatus, StopReason,
};
pub use stage::{is_legal_path, Stage, StageMachine};
