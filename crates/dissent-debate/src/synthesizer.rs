//! Synthesizer: the final answer set
//!
//! The answer list is computed deterministically from the final round;
//! the optional narrative only rewords it for the user.

use std::sync::Arc;

use dissent_core::{
    AgentId, AgentResponse, AmbiguityAssessment, AnswerEntry, Classification, DebateError,
    Disagreement, FinalAnswer, Query, ResponseStatus,
};
use dissent_llm::{LlmProvider, LlmRequest};

use crate::ambiguity::{contradictions, Contradiction};
use crate::equivalence::{group_responses, AnswerGroup};
use crate::prompts;

fn agent_list(agents: &[AgentId]) -> String {
    let labels: Vec<String> = agents.iter().map(|a| format!("Agent {}", a)).collect();
    labels.join(", ")
}

fn doc_list(group: &AnswerGroup, responses: &[AgentResponse]) -> String {
    let mut docs: Vec<u32> = responses
        .iter()
        .filter(|r| group.contains(r.agent_id))
        .flat_map(|r| r.doc_ids.iter().copied())
        .collect();
    docs.sort_unstable();
    docs.dedup();
    let labels: Vec<String> = docs.iter().map(|d| format!("Doc {}", d)).collect();
    labels.join(", ")
}

fn note_for(
    group: &AnswerGroup,
    responses: &[AgentResponse],
    classification: Classification,
    disputed: bool,
) -> String {
    let docs = doc_list(group, responses);
    match classification {
        Classification::ResolvedSingle if group.agents.len() > 1 => {
            format!("Agreed by {} agents ({}).", group.agents.len(), docs)
        }
        Classification::ResolvedSingle => format!("Supported by {}.", docs),
        Classification::ResolvedMulti => format!(
            "Valid for the subject described in {}; the question has more than one valid answer.",
            docs
        ),
        Classification::UnresolvedConflict if disputed => {
            format!("Contested: another agent disputes the evidence in {}.", docs)
        }
        Classification::UnresolvedConflict => {
            format!("Supported by {}; conflicts with another answer.", docs)
        }
    }
}

fn flag_for(
    group: &AnswerGroup,
    conflicts: &[Contradiction],
    others: &[&AnswerGroup],
) -> Disagreement {
    let against: Vec<&Contradiction> = conflicts
        .iter()
        .filter(|c| group.contains(c.against))
        .collect();
    let raised: Vec<&Contradiction> = conflicts
        .iter()
        .filter(|c| group.contains(c.raised_by))
        .collect();

    let mut disputed_by: Vec<AgentId> = against.iter().map(|c| c.raised_by).collect();
    disputed_by.sort_unstable();
    disputed_by.dedup();

    let detail = if against.is_empty() && raised.is_empty() {
        let rivals: Vec<String> = others.iter().map(|g| format!("'{}'", g.value)).collect();
        format!(
            "'{}' conflicts with {} and the debate ended unresolved.",
            group.value,
            rivals.join(", ")
        )
    } else {
        against
            .iter()
            .chain(raised.iter())
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    };

    Disagreement {
        answer: group.key.as_str().to_string(),
        agents: group.agents.clone(),
        disputed_by,
        detail,
    }
}

fn summarize(
    entries: &[AnswerEntry],
    classification: Classification,
    abstained: &[AgentId],
) -> String {
    let mut summary = match (entries.len(), classification) {
        (0, _) => "None of the documents contains an answer to the question.".to_string(),
        (1, _) => format!(
            "Final Answer: {} (supported by {}).",
            entries[0].value,
            agent_list(&entries[0].supporting_agents)
        ),
        (n, Classification::UnresolvedConflict) => {
            let values: Vec<&str> = entries.iter().map(|e| e.value.as_str()).collect();
            format!(
                "The documents disagree and the conflict was not resolved. {} answers remain: {}. Please check the sources or clarify the question.",
                n,
                values.join("; ")
            )
        }
        (n, _) => {
            let values: Vec<String> = entries
                .iter()
                .map(|e| format!("{} ({})", e.value, agent_list(&e.supporting_agents)))
                .collect();
            format!(
                "The question has {} valid answers: {}. Please clarify which one you mean.",
                n,
                values.join("; ")
            )
        }
    };
    if !abstained.is_empty() {
        summary.push_str(&format!(
            " {} found no answer in its evidence.",
            agent_list(abstained)
        ));
    }
    summary
}

#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesizer that can also narrate the final answer
    pub fn with_narration(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm: Some(llm) }
    }

    /// Build the final answer from the last round and its assessment.
    ///
    /// Each equivalence group becomes one entry carrying the union of its
    /// citations. When the debate ended unresolved every group is also
    /// flagged. Fails only if a claim in the last round has no entry.
    pub fn synthesize(
        &self,
        responses: &[AgentResponse],
        assessment: &AmbiguityAssessment,
    ) -> Result<FinalAnswer, DebateError> {
        let groups = group_responses(responses);
        let conflicts = contradictions(responses, &groups);
        let classification = assessment.classification;

        let answers: Vec<AnswerEntry> = groups
            .iter()
            .map(|g| {
                let disputed = conflicts.iter().any(|c| g.contains(c.against));
                AnswerEntry {
                    value: g.value.clone(),
                    key: g.key.as_str().to_string(),
                    supporting_agents: g.agents.clone(),
                    citations: g.citations.clone(),
                    note: note_for(g, responses, classification, disputed),
                }
            })
            .collect();

        let disagreements = if classification == Classification::UnresolvedConflict {
            groups
                .iter()
                .map(|g| {
                    let others: Vec<&AnswerGroup> =
                        groups.iter().filter(|o| o.key != g.key).collect();
                    flag_for(g, &conflicts, &others)
                })
                .collect()
        } else {
            Vec::new()
        };

        let claimed = responses.iter().filter(|r| r.has_claim()).count();
        let covered: usize = answers.iter().map(|a| a.supporting_agents.len()).sum();
        if covered != claimed {
            return Err(DebateError::Synthesis(format!(
                "{} claims in round {} but only {} are represented in the answer set",
                claimed, assessment.round, covered
            )));
        }

        let mut abstained: Vec<AgentId> = responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Abstained)
            .map(|r| r.agent_id)
            .collect();
        abstained.sort_unstable();

        let summary = summarize(&answers, classification, &abstained);
        metrics::counter!(
            "dissent_final_answers_total",
            "classification" => classification_label(classification)
        )
        .increment(1);

        Ok(FinalAnswer {
            answers,
            disagreements,
            classification,
            abstained,
            summary,
        })
    }

    /// Ask for a user-facing narrative over `answer`.
    ///
    /// `None` when narration is disabled or the call fails; the caller
    /// keeps the deterministic summary in that case.
    pub async fn narrate(&self, query: &Query, answer: &FinalAnswer) -> Option<String> {
        let llm = self.llm.as_ref()?;
        if answer.answers.is_empty() {
            return None;
        }

        let conflicted = answer.classification == Classification::UnresolvedConflict;
        let request = LlmRequest::with_role(
            prompts::SYNTHESIZER_SYSTEM,
            &prompts::synthesizer_prompt(query, &answer.answers, conflicted),
        )
        .max_tokens(400);

        match llm.complete(request).await {
            Ok(reply) => {
                let text = reply.content.trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Narration unavailable, keeping deterministic summary");
                None
            }
        }
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::ResolvedSingle => "resolved_single",
        Classification::ResolvedMulti => "resolved_multi",
        Classification::UnresolvedConflict => "unresolved_conflict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AmbiguitySolver;
    use dissent_core::{Citation, Dispute};
    use dissent_llm::MockProvider;

    fn answer(agent: AgentId, value: &str) -> AgentResponse {
        AgentResponse {
            agent_id: agent,
            doc_ids: vec![agent],
            round: 2,
            answer: value.to_string(),
            explanation: String::new(),
            citations: vec![Citation { doc_id: agent, rank: 1 }],
            disputes: Vec::new(),
            status: ResponseStatus::Answered,
        }
    }

    fn finish(responses: &[AgentResponse]) -> FinalAnswer {
        let assessment = AmbiguitySolver::new().assess(2, 2, responses, None);
        Synthesizer::new().synthesize(responses, &assessment).unwrap()
    }

    #[test]
    fn test_three_distinct_answers_are_all_kept() {
        let responses = vec![answer(1, "1963"), answer(2, "2000"), answer(3, "1888")];
        let result = finish(&responses);

        assert_eq!(result.answers.len(), 3);
        assert_eq!(result.classification, Classification::ResolvedMulti);
        assert!(result.disagreements.is_empty());
        assert!(result.is_ambiguous());
        assert!(result.summary.starts_with("The question has 3 valid answers"));
        assert_eq!(result.answers[1].citations, vec![Citation { doc_id: 2, rank: 1 }]);
    }

    #[test]
    fn test_equivalent_answers_merge_citations() {
        let responses = vec![answer(1, "1963"), answer(2, "born in 1963")];
        let result = finish(&responses);

        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.answers[0].supporting_agents, vec![1, 2]);
        assert_eq!(result.answers[0].citations.len(), 2);
        assert_eq!(result.summary, "Final Answer: 1963 (supported by Agent 1, Agent 2).");
    }

    #[test]
    fn test_conflict_flags_every_group() {
        let mut first = answer(1, "1963");
        first.disputes.push(Dispute {
            target_agent: 2,
            reason: "Doc 2 is a profile page with a typo".to_string(),
        });
        let responses = vec![first, answer(2, "2000"), answer(3, "1888")];
        let result = finish(&responses);

        assert_eq!(result.classification, Classification::UnresolvedConflict);
        assert_eq!(result.answers.len(), 3);
        assert_eq!(result.disagreements.len(), 3);

        let flagged = &result.disagreements[1];
        assert_eq!(flagged.answer, "2000");
        assert_eq!(flagged.disputed_by, vec![1]);
        assert!(flagged.detail.contains("profile page with a typo"));
        assert!(result.disagreements[2].detail.contains("debate ended unresolved"));
    }

    #[test]
    fn test_abstentions_and_degraded_are_excluded() {
        let mut abstain = answer(2, "unknown");
        abstain.status = ResponseStatus::Abstained;
        let responses = vec![
            answer(1, "1963"),
            abstain,
            AgentResponse::degraded(3, vec![3], 2, "timeout"),
        ];
        let result = finish(&responses);

        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.abstained, vec![2]);
        assert!(result.summary.ends_with("Agent 2 found no answer in its evidence."));
    }

    #[test]
    fn test_no_claims_yields_empty_answer() {
        let responses = vec![AgentResponse::degraded(1, vec![1], 1, "timeout")];
        let result = finish(&responses);
        assert!(result.answers.is_empty());
        assert_eq!(result.classification, Classification::ResolvedSingle);
    }

    #[tokio::test]
    async fn test_narration_falls_back_to_none() {
        let query = dissent_core::DebateRequest::new(vec!["d"], "What year?")
            .validate(&dissent_core::Limits::default())
            .unwrap()
            .query;
        let result = finish(&[answer(1, "1963"), answer(2, "2000")]);

        let narrator = Synthesizer::with_narration(Arc::new(MockProvider::smart()));
        let text = narrator.narrate(&query, &result).await.unwrap();
        assert!(text.starts_with("Final Answer:"));

        let failing = Synthesizer::with_narration(Arc::new(
            MockProvider::smart().always_fail_on("Synthesizer"),
        ));
        assert!(failing.narrate(&query, &result).await.is_none());
        assert!(Synthesizer::new().narrate(&query, &result).await.is_none());
    }
}
