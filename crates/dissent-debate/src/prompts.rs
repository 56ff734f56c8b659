//! Prompt templates for the three debate roles

use dissent_core::{AgentAssignment, AgentResponse, AnswerEntry, Query};

/// The JSON contract every debater reply must follow
pub const RESPONSE_FORMAT: &str = r#"{"answer": "<short answer value, or \"unknown\" if your evidence has none>", "explanation": "<why, citing snippets like [1]>", "citations": [<snippet numbers>], "disputes": [{"agent": <agent number>, "reason": "<why that agent's evidence is wrong or does not apply>"}]}"#;

pub const AMBIGUITY_SYSTEM: &str = "You are the Ambiguity Solver. You detect ambiguity versus factual \
conflict in the answers given by document-bound agents. You never answer the question yourself.";

pub const SYNTHESIZER_SYSTEM: &str = "You are the Synthesizer. You write the final answer for the user \
based only on the answer groups you are given. You never add, merge or drop answers.";

pub fn debater_system(assignment: &AgentAssignment) -> String {
    format!(
        "You are Agent {}, a debate agent bound to {}. \
         Answer only from your assigned evidence snippets. \
         Do not use outside knowledge and do not assume other documents are about the same subject as yours. \
         If your evidence does not contain an answer, answer \"unknown\".",
        assignment.agent_id,
        doc_list(assignment)
    )
}

fn doc_list(assignment: &AgentAssignment) -> String {
    let labels: Vec<String> = assignment
        .doc_ids
        .iter()
        .map(|id| format!("Doc {}", id))
        .collect();
    labels.join(" and ")
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// User prompt for one agent in one round.
///
/// `transcript` holds the public responses of strictly earlier rounds.
pub fn debater_prompt(
    query: &Query,
    assignment: &AgentAssignment,
    round: u32,
    transcript: &[AgentResponse],
    guidance: Option<&str>,
) -> String {
    let mut prompt = format!("Question: {}\nRound: {}\n\nEvidence:\n", query, round);

    if assignment.snippets.is_empty() {
        prompt.push_str("(no snippets were retrieved for your documents)\n");
    }
    for (i, snippet) in assignment.snippets.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({}) {}\n",
            i + 1,
            snippet.reference(),
            one_line(&snippet.text)
        ));
    }

    if !transcript.is_empty() {
        prompt.push_str("\nPrevious rounds:\n");
        for response in transcript {
            prompt.push_str(&format!(
                "Round {}, Agent {}: {}\n",
                response.round,
                response.agent_id,
                one_line(&response.claim())
            ));
        }
    }

    if let Some(guidance) = guidance {
        prompt.push_str(&format!("\nAmbiguity guidance: {}\n", one_line(guidance)));
    }

    prompt.push_str("\nRespond with a single JSON object and nothing else:\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push_str(
        "\nCite only the snippet numbers above. List a dispute only when another agent's \
         evidence is wrong or does not apply, not merely because its answer differs. \
         Clarify which subject your answer refers to.",
    );
    prompt
}

/// User prompt asking for clarification guidance over one round's responses
pub fn ambiguity_prompt(query: &Query, responses: &[AgentResponse]) -> String {
    let lines: Vec<String> = responses
        .iter()
        .map(|r| format!("Agent {}: {}", r.agent_id, one_line(&r.claim())))
        .collect();
    format!(
        "Question: {}\nResponses:\n{}\n\n\
         If the answers conflict, suggest clarification questions or guidance to disambiguate. \
         If the question is ambiguous, list the plausible interpretations.\n\
         Format: Guidance: <guidance>. Questions: <questions>.",
        query,
        lines.join("\n")
    )
}

/// User prompt asking for a narrative over the final answer groups
pub fn synthesizer_prompt(query: &Query, answers: &[AnswerEntry], conflicted: bool) -> String {
    let lines: Vec<String> = answers
        .iter()
        .map(|g| {
            let agents: Vec<String> = g
                .supporting_agents
                .iter()
                .map(|a| format!("Agent {}", a))
                .collect();
            let cites: Vec<String> = g.citations.iter().map(|c| c.to_string()).collect();
            format!(
                "- {} (supported by {}; sources {})",
                g.value,
                agents.join(", "),
                cites.join(", ")
            )
        })
        .collect();
    let mut prompt = format!(
        "Question: {}\nAnswer groups:\n{}\n\n",
        query,
        lines.join("\n")
    );
    if conflicted {
        prompt.push_str("The agents could not resolve a conflict between these answers; say so.\n");
    }
    prompt.push_str(
        "If there is more than one answer because the question is ambiguous, list all valid answers \
         with their sources and ask the user to clarify.\n\
         Format: Final Answer: <answer>.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::{DebateRequest, EvidenceSnippet, Limits};

    fn assignment() -> AgentAssignment {
        AgentAssignment {
            agent_id: 2,
            doc_ids: vec![2],
            snippets: vec![EvidenceSnippet {
                doc_id: 2,
                rank: 1,
                score: 0.9,
                start: 0,
                text: "Michael Jordan was\nborn in 2000.".to_string(),
            }],
        }
    }

    fn query() -> Query {
        DebateRequest::new(vec!["d"], "What year was Michael Jordan born?")
            .validate(&Limits::default())
            .unwrap()
            .query
    }

    #[test]
    fn test_debater_system_names_agent_and_docs() {
        let a = assignment();
        let system = debater_system(&a);
        assert!(system.starts_with("You are Agent 2, a debate agent bound to Doc 2."));
    }

    #[test]
    fn test_first_round_prompt_has_no_transcript() {
        let prompt = debater_prompt(&query(), &assignment(), 1, &[], None);
        assert!(prompt.contains("[1] (D2#1) Michael Jordan was born in 2000.\n"));
        assert!(!prompt.contains("Previous rounds:"));
        assert!(!prompt.contains("Ambiguity guidance:"));
    }

    #[test]
    fn test_later_round_prompt_includes_transcript_and_guidance() {
        let earlier = AgentResponse::degraded(1, vec![1], 1, "timeout");
        let prompt = debater_prompt(&query(), &assignment(), 2, &[earlier], Some("Which one?"));
        assert!(prompt.contains("Previous rounds:\nRound 1, Agent 1: [no response: timeout]"));
        assert!(prompt.contains("Ambiguity guidance: Which one?"));
    }

    #[test]
    fn test_role_prompts_do_not_collide() {
        assert!(!AMBIGUITY_SYSTEM.contains("debate agent"));
        assert!(!SYNTHESIZER_SYSTEM.contains("debate agent"));
        assert!(!SYNTHESIZER_SYSTEM.to_lowercase().contains("ambiguity"));
    }
}
