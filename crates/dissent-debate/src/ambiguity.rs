//! Ambiguity Solver: round classification and the continue/stop decision
//!
//! Classification is deterministic over the round's responses:
//!
//! | Answer groups | Cross-group dispute | Classification |
//! |---------------|---------------------|----------------|
//! | 0 or 1        | any                 | resolved-single |
//! | 2+            | none                | resolved-multi |
//! | 2+            | at least one        | unresolved-conflict |
//!
//! A dispute is cross-group when an answering agent asserts that the
//! evidence of an agent holding a different answer is wrong or
//! inapplicable. Merely giving a different answer is not a dispute.

use std::sync::Arc;

use dissent_core::{
    AgentId, AgentResponse, AmbiguityAssessment, Classification, Decision, Query, StopReason,
};
use dissent_llm::{LlmProvider, LlmRequest};

use crate::equivalence::{group_responses, AnswerGroup};
use crate::prompts;

/// A dispute between agents holding different answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contradiction {
    pub raised_by: AgentId,
    pub against: AgentId,
    pub reason: String,
}

impl std::fmt::Display for Contradiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "Agent {} disputes Agent {}'s evidence", self.raised_by, self.against)
        } else {
            write!(
                f,
                "Agent {} disputes Agent {}'s evidence: {}",
                self.raised_by, self.against, self.reason
            )
        }
    }
}

/// Disputes raised by answering agents against answering agents in other groups
pub fn contradictions(responses: &[AgentResponse], groups: &[AnswerGroup]) -> Vec<Contradiction> {
    let group_of = |agent: AgentId| groups.iter().position(|g| g.contains(agent));

    let mut sorted: Vec<&AgentResponse> = responses.iter().collect();
    sorted.sort_by_key(|r| r.agent_id);

    let mut found = Vec::new();
    for response in sorted {
        let Some(own) = group_of(response.agent_id) else {
            continue;
        };
        for dispute in &response.disputes {
            match group_of(dispute.target_agent) {
                Some(other) if other != own => found.push(Contradiction {
                    raised_by: response.agent_id,
                    against: dispute.target_agent,
                    reason: dispute.reason.clone(),
                }),
                _ => {}
            }
        }
    }
    found
}

fn quote_groups(groups: &[AnswerGroup]) -> String {
    groups
        .iter()
        .map(|g| {
            let agents: Vec<String> = g.agents.iter().map(|a| format!("Agent {}", a)).collect();
            format!("'{}' ({})", g.value, agents.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
pub struct AmbiguitySolver {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl AmbiguitySolver {
    /// Deterministic solver with no guidance capability
    pub fn new() -> Self {
        Self::default()
    }

    /// Solver that also asks `llm` for clarification guidance
    pub fn with_guidance(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm: Some(llm) }
    }

    /// Classify one completed round and decide whether to debate again.
    ///
    /// `previous` is the assessment of the round before, if any; an
    /// unchanged candidate answer set means the debate has stalled.
    pub fn assess(
        &self,
        round: u32,
        max_rounds: u32,
        responses: &[AgentResponse],
        previous: Option<&AmbiguityAssessment>,
    ) -> AmbiguityAssessment {
        let groups = group_responses(responses);
        let conflicts = contradictions(responses, &groups);
        let abstained = responses
            .iter()
            .filter(|r| !r.is_degraded() && !r.has_claim())
            .count();
        let degraded = responses.iter().filter(|r| r.is_degraded()).count();

        let (classification, mut rationale) = match groups.len() {
            0 => (
                Classification::ResolvedSingle,
                "No agent found an answer in its evidence.".to_string(),
            ),
            1 => (
                Classification::ResolvedSingle,
                format!(
                    "All answering agents agree: {}.",
                    quote_groups(&groups)
                ),
            ),
            n if conflicts.is_empty() => (
                Classification::ResolvedMulti,
                format!(
                    "{} distinct answers, each supported by its own evidence with no agent disputing another's: {}.",
                    n,
                    quote_groups(&groups)
                ),
            ),
            n => {
                let details: Vec<String> = conflicts.iter().map(|c| c.to_string()).collect();
                (
                    Classification::UnresolvedConflict,
                    format!(
                        "{} distinct answers with contradicting evidence: {}. {}.",
                        n,
                        quote_groups(&groups),
                        details.join("; ")
                    ),
                )
            }
        };
        if abstained > 0 {
            rationale.push_str(&format!(" {} agent(s) abstained.", abstained));
        }
        if degraded > 0 {
            rationale.push_str(&format!(" {} agent(s) failed to respond.", degraded));
        }

        let mut candidate_answers: Vec<String> =
            groups.iter().map(|g| g.key.as_str().to_string()).collect();
        candidate_answers.sort();

        let decision = if classification.is_resolved() {
            Decision::Stop(StopReason::Resolved)
        } else if round >= max_rounds {
            Decision::Stop(StopReason::RoundLimit)
        } else if previous.is_some_and(|p| p.candidate_answers == candidate_answers) {
            Decision::Stop(StopReason::NoNewInformation)
        } else {
            Decision::Continue
        };

        tracing::debug!(
            round,
            classification = ?classification,
            decision = ?decision,
            answers = candidate_answers.len(),
            "Round assessed"
        );

        AmbiguityAssessment {
            round,
            classification,
            rationale,
            decision,
            candidate_answers,
            guidance: None,
        }
    }

    /// Ask for clarification guidance over the round's responses.
    ///
    /// Returns `None` when no capability is configured or the call fails;
    /// guidance never fails a debate.
    pub async fn guidance(&self, query: &Query, responses: &[AgentResponse]) -> Option<String> {
        let llm = self.llm.as_ref()?;
        let request = LlmRequest::with_role(
            prompts::AMBIGUITY_SYSTEM,
            &prompts::ambiguity_prompt(query, responses),
        )
        .max_tokens(400);

        match llm.complete(request).await {
            Ok(reply) => {
                let text = reply.content.trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ambiguity guidance unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::{Citation, Dispute, ResponseStatus};
    use dissent_llm::MockProvider;

    fn answer(agent: AgentId, value: &str) -> AgentResponse {
        AgentResponse {
            agent_id: agent,
            doc_ids: vec![agent],
            round: 1,
            answer: value.to_string(),
            explanation: format!("Doc {} says {}", agent, value),
            citations: vec![Citation { doc_id: agent, rank: 1 }],
            disputes: Vec::new(),
            status: ResponseStatus::Answered,
        }
    }

    fn disputing(agent: AgentId, value: &str, target: AgentId) -> AgentResponse {
        let mut r = answer(agent, value);
        r.disputes.push(Dispute {
            target_agent: target,
            reason: "that document describes a different person".to_string(),
        });
        r
    }

    #[test]
    fn test_equivalent_answers_resolve_single() {
        let solver = AmbiguitySolver::new();
        let responses = vec![answer(1, "1963"), answer(2, "born in 1963")];
        let a = solver.assess(1, 2, &responses, None);

        assert_eq!(a.classification, Classification::ResolvedSingle);
        assert_eq!(a.decision, Decision::Stop(StopReason::Resolved));
        assert_eq!(a.candidate_answers, vec!["1963".to_string()]);
    }

    #[test]
    fn test_independent_answers_resolve_multi() {
        let solver = AmbiguitySolver::new();
        let responses = vec![answer(1, "1963"), answer(2, "2000"), answer(3, "1888")];
        let a = solver.assess(1, 2, &responses, None);

        assert_eq!(a.classification, Classification::ResolvedMulti);
        assert!(a.decision.is_stop());
        assert!(a.rationale.starts_with("3 distinct answers"));
    }

    #[test]
    fn test_dispute_across_groups_is_conflict_and_continues() {
        let solver = AmbiguitySolver::new();
        let responses = vec![disputing(1, "1963", 2), answer(2, "2000")];
        let a = solver.assess(1, 3, &responses, None);

        assert_eq!(a.classification, Classification::UnresolvedConflict);
        assert_eq!(a.decision, Decision::Continue);
        assert!(a.rationale.contains("Agent 1 disputes Agent 2's evidence"));
    }

    #[test]
    fn test_dispute_within_group_is_not_conflict() {
        let solver = AmbiguitySolver::new();
        let responses = vec![disputing(1, "1963", 2), answer(2, "1963"), answer(3, "2000")];
        let a = solver.assess(1, 3, &responses, None);
        assert_eq!(a.classification, Classification::ResolvedMulti);
    }

    #[test]
    fn test_conflict_stops_at_round_limit() {
        let solver = AmbiguitySolver::new();
        let responses = vec![disputing(1, "1963", 2), answer(2, "2000")];
        let a = solver.assess(2, 2, &responses, None);
        assert_eq!(a.decision, Decision::Stop(StopReason::RoundLimit));
    }

    #[test]
    fn test_unchanged_answers_stop_without_new_information() {
        let solver = AmbiguitySolver::new();
        let responses = vec![disputing(1, "1963", 2), answer(2, "2000")];
        let first = solver.assess(1, 4, &responses, None);
        assert_eq!(first.decision, Decision::Continue);

        let mut second_round = responses.clone();
        for r in &mut second_round {
            r.round = 2;
        }
        let second = solver.assess(2, 4, &second_round, Some(&first));
        assert_eq!(second.decision, Decision::Stop(StopReason::NoNewInformation));
    }

    #[test]
    fn test_degraded_and_abstained_are_not_candidates() {
        let solver = AmbiguitySolver::new();
        let mut abstain = answer(2, "unknown");
        abstain.status = ResponseStatus::Abstained;
        let responses = vec![
            answer(1, "1963"),
            abstain,
            AgentResponse::degraded(3, vec![3], 1, "timeout"),
        ];
        let a = solver.assess(1, 2, &responses, None);

        assert_eq!(a.classification, Classification::ResolvedSingle);
        assert_eq!(a.candidate_answers, vec!["1963".to_string()]);
        assert!(a.rationale.contains("1 agent(s) abstained"));
        assert!(a.rationale.contains("1 agent(s) failed to respond"));
    }

    #[tokio::test]
    async fn test_guidance_is_optional() {
        let query = dissent_core::DebateRequest::new(vec!["d"], "When?")
            .validate(&dissent_core::Limits::default())
            .unwrap()
            .query;
        let responses = vec![answer(1, "1963")];

        assert!(AmbiguitySolver::new().guidance(&query, &responses).await.is_none());

        let solver = AmbiguitySolver::with_guidance(Arc::new(MockProvider::smart()));
        let guidance = solver.guidance(&query, &responses).await.unwrap();
        assert!(guidance.starts_with("Guidance:"));

        let failing = AmbiguitySolver::with_guidance(Arc::new(
            MockProvider::smart().always_fail_on("Ambiguity Solver"),
        ));
        assert!(failing.guidance(&query, &responses).await.is_none());
    }
}
