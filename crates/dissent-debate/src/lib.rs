//! # Dissent Debate
//!
//! The three reasoning roles of a debate session.
//!
//! ## Key Types
//!
//! - [`Debater`]: one grounded response per agent per round
//! - [`AmbiguitySolver`]: classifies a round and decides continue/stop
//! - [`Synthesizer`]: enumerates every surviving answer with its citations
//! - [`AnswerKey`]: the equivalence both the solver and the synthesizer use
//!
//! ## Quick Start
//!
//! ```rust
//! use dissent_core::{AgentResponse, Citation, Classification, ResponseStatus};
//! use dissent_debate::{AmbiguitySolver, Synthesizer};
//!
//! let response = |agent: u32, answer: &str| AgentResponse {
//!     agent_id: agent,
//!     doc_ids: vec![agent],
//!     round: 1,
//!     answer: answer.to_string(),
//!     explanation: String::new(),
//!     citations: vec![Citation { doc_id: agent, rank: 1 }],
//!     disputes: Vec::new(),
//!     status: ResponseStatus::Answered,
//! };
//! let round = vec![response(1, "1963"), response(2, "2000")];
//!
//! let assessment = AmbiguitySolver::new().assess(1, 2, &round, None);
//! assert_eq!(assessment.classification, Classification::ResolvedMulti);
//!
//! let answer = Synthesizer::new().synthesize(&round, &assessment).unwrap();
//! assert_eq!(answer.answers.len(), 2);
//! ```

pub mod ambiguity;
pub mod debater;
pub mod equivalence;
pub mod prompts;
pub mod synthesizer;

pub use ambiguity::{contradictions, AmbiguitySolver, Contradiction};
pub use debater::{parse_response, Debater, DebaterError, ParseError};
pub use equivalence::{group_responses, is_abstention, AnswerGroup, AnswerKey};
pub use synthesizer::Synthesizer;
